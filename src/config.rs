//! Tunable parameters.
//!
//! All identifiers default to the assigned numbers in [`crate::protocol`];
//! overriding them is mainly useful against test peripherals that expose
//! the control service under a vendor number.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol;

/// Longest accepted scan-retry delay.
const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuracastConfig {
    // --- Identifiers (16-bit, expanded on the base UUID) ---
    /// Service marker that advertisements must carry to be considered.
    pub announcement_uuid16: u16,
    /// Control service on the scan delegator.
    pub control_service_uuid16: u16,
    /// Control point characteristic inside the control service.
    pub control_point_uuid16: u16,
    /// Receive state characteristic inside the control service.
    pub receive_state_uuid16: u16,

    // --- Scan ---
    /// Delay before the single automatic scan restart (milliseconds).
    pub scan_retry_delay_ms: u64,
    /// Name shown while the name-disclosure capability is missing.
    pub redacted_name: String,

    // --- Transport ---
    /// Total write attempts per command (first try included).
    pub max_write_attempts: u8,
}

impl Default for AuracastConfig {
    fn default() -> Self {
        Self {
            announcement_uuid16: protocol::BROADCAST_AUDIO_ANNOUNCEMENT_UUID16,
            control_service_uuid16: protocol::BROADCAST_AUDIO_SCAN_SERVICE_UUID16,
            control_point_uuid16: protocol::CONTROL_POINT_UUID16,
            receive_state_uuid16: protocol::RECEIVE_STATE_UUID16,
            scan_retry_delay_ms: 500,
            redacted_name: String::from("Unknown Device"),
            max_write_attempts: 2,
        }
    }
}

impl AuracastConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(doc)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would disable retries or produce unusable output.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_write_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_write_attempts must be at least 1",
            ));
        }
        if self.redacted_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redacted_name must not be empty",
            ));
        }
        if self.scan_retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::ValidationFailed(
                "scan_retry_delay_ms must be 0–60000",
            ));
        }
        if self.control_point_uuid16 == self.receive_state_uuid16 {
            return Err(ConfigError::ValidationFailed(
                "control point and receive state must differ",
            ));
        }
        Ok(())
    }

    pub fn announcement_uuid(&self) -> u128 {
        protocol::expand_uuid16(self.announcement_uuid16)
    }

    pub fn control_service_uuid(&self) -> u128 {
        protocol::expand_uuid16(self.control_service_uuid16)
    }

    pub fn control_point_uuid(&self) -> u128 {
        protocol::expand_uuid16(self.control_point_uuid16)
    }

    pub fn receive_state_uuid(&self) -> u128 {
        protocol::expand_uuid16(self.receive_state_uuid16)
    }

    pub fn scan_retry_delay(&self) -> core::time::Duration {
        core::time::Duration::from_millis(self.scan_retry_delay_ms)
    }
}
