//! auracast-tool: offline inspection of broadcast assistant frames.
//!
//! ```text
//!  decode <hex>            announcement payload  ──▶ JSON BroadcastInfo
//!  receive-state <hex>     receive-state value   ──▶ JSON ReceiveState
//!  join / modify ...       selection parameters  ──▶ control-point frame (hex)
//!  config [--config path]  effective tunables    ──▶ JSON
//! ```
#![deny(unused_must_use)]

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{debug, warn};

use auracast_assist::AuracastConfig;
use auracast_assist::codec::decode_broadcast_info;
use auracast_assist::codec::encoder::{encode_join, encode_modify};
use auracast_assist::codec::receive_state::decode_receive_state;

#[derive(Parser)]
#[command(name = "auracast-tool")]
#[command(about = "Decode broadcast announcements and build scan-delegator control frames")]
#[command(long_about = "
Offline companion for the broadcast assistant core.

EXAMPLES:
  # Decode a Broadcast Audio Announcement service-data payload
  auracast-tool decode 3c2b1a000101060000000000076c616e673d656e

  # First selection on a delegator that registered the source as id 1
  auracast-tool join --source-id 1 1 3

  # Switch to index 2 on broadcast 0x1A2B3C
  auracast-tool modify --source-id 1 --broadcast-id 1a2b3c 2
")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode an announcement payload (service or manufacturer data)
    Decode {
        /// Payload bytes as hex
        payload: String,
    },
    /// Decode a receive-state characteristic value
    ReceiveState {
        /// Characteristic value as hex (empty string for an empty slot)
        value: String,
    },
    /// Build a Join frame
    Join {
        #[arg(long)]
        source_id: u8,
        /// Stream indexes, 1-based, in the order to send
        #[arg(required = true)]
        indexes: Vec<u8>,
    },
    /// Build a Modify frame
    Modify {
        #[arg(long)]
        source_id: u8,
        /// 24-bit broadcast id as hex
        #[arg(long)]
        broadcast_id: String,
        /// Broadcast code as hex
        #[arg(long)]
        code: Option<String>,
        /// Stream indexes, 1-based
        #[arg(required = true)]
        indexes: Vec<u8>,
    },
    /// Print the effective configuration
    Config {
        /// JSON config file; missing fields take defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Decode { payload } => {
            let bytes = parse_hex(&payload)?;
            let info = decode_broadcast_info(&bytes);
            if info.truncated {
                warn!("payload truncated; showing the part that decoded");
            }
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::ReceiveState { value } => {
            let bytes = parse_hex(&value)?;
            match decode_receive_state(&bytes).context("decoding receive state")? {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => println!("null"),
            }
        }
        Command::Join { source_id, indexes } => {
            let frame = encode_join(source_id, &indexes);
            print_frame(&frame)?;
        }
        Command::Modify {
            source_id,
            broadcast_id,
            code,
            indexes,
        } => {
            let broadcast_id = u32::from_str_radix(broadcast_id.trim_start_matches("0x"), 16)
                .with_context(|| format!("invalid broadcast id '{broadcast_id}'"))?;
            let code = code.as_deref().map(parse_hex).transpose()?;
            let frame = encode_modify(source_id, &indexes, broadcast_id, code.as_deref());
            print_frame(&frame)?;
        }
        Command::Config { config } => {
            let cfg = match config {
                Some(path) => {
                    debug!("loading config from {}", path.display());
                    let doc = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    AuracastConfig::from_json(&doc)
                        .with_context(|| format!("loading {}", path.display()))?
                }
                None => AuracastConfig::default(),
            };
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }
    Ok(())
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&cleaned).with_context(|| format!("invalid hex '{text}'"))
}

fn print_frame(frame: &[u8]) -> Result<()> {
    if frame.is_empty() {
        bail!("parameters cannot be encoded into a control-point frame");
    }
    println!("{}", hex::encode(frame));
    Ok(())
}
