//! Subgroup metadata tokenizer.
//!
//! The metadata blob is free text made of whitespace-separated
//! `key=value` tokens:
//!
//! ```text
//! lang=eng audio_role=commentary stream_config=48_2
//! ```
//!
//! Tokens without `=`, with an empty key, or with an unknown key are
//! skipped. When a key repeats, the first usable occurrence wins. A `lang`
//! value is accepted only if it is 2–3 lowercase ASCII letters; it is
//! title-cased on output (`eng` → `Eng`).

use super::UNKNOWN_LANGUAGE;

pub const KEY_LANGUAGE: &str = "lang";
pub const KEY_AUDIO_ROLE: &str = "audio_role";
pub const KEY_STREAM_CONFIG: &str = "stream_config";

/// The three fields a subgroup can describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    pub language: String,
    pub audio_role: Option<String>,
    pub stream_config: Option<String>,
}

impl Default for StreamMetadata {
    fn default() -> Self {
        Self {
            language: UNKNOWN_LANGUAGE.to_string(),
            audio_role: None,
            stream_config: None,
        }
    }
}

/// A single `key=value` pair borrowed from the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Split a blob into well-formed tokens.
pub fn tokens(blob: &str) -> impl Iterator<Item = Token<'_>> {
    blob.split_whitespace().filter_map(|raw| {
        let (key, value) = raw.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        Some(Token { key, value })
    })
}

/// Extract the known fields from a metadata blob.
pub fn parse_metadata(blob: &str) -> StreamMetadata {
    let mut language: Option<String> = None;
    let mut audio_role: Option<String> = None;
    let mut stream_config: Option<String> = None;

    for Token { key, value } in tokens(blob) {
        match key {
            KEY_LANGUAGE if language.is_none() => {
                language = normalize_language(value);
            }
            KEY_AUDIO_ROLE if audio_role.is_none() && !value.is_empty() => {
                audio_role = Some(value.to_string());
            }
            KEY_STREAM_CONFIG if stream_config.is_none() && !value.is_empty() => {
                stream_config = Some(value.to_string());
            }
            _ => {}
        }
    }

    StreamMetadata {
        language: language.unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()),
        audio_role,
        stream_config,
    }
}

fn normalize_language(value: &str) -> Option<String> {
    if !(2..=3).contains(&value.len()) || !value.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    if let Some(first) = chars.next() {
        out.push(first.to_ascii_uppercase());
    }
    out.extend(chars);
    Some(out)
}
