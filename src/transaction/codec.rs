//! Base64 wire encoding for envelopes and entries
//!
//! The payload under the base64 layer is JSON. Typed decoding is for
//! reading; anything that has to go back out unchanged goes through the
//! text functions instead, which never re-serialize.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Codec(e.to_string()))?;
    Ok(STANDARD.encode(bytes))
}

pub fn decode<T: DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_slice(&decode_bytes(input)?).map_err(malformed)
}

/// JSON text under the base64 layer, exactly as it was encoded
pub fn decode_text(input: &str) -> Result<String> {
    String::from_utf8(decode_bytes(input)?).map_err(malformed)
}

pub fn encode_text(json: &str) -> String {
    STANDARD.encode(json)
}

pub fn parse<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(malformed)
}

/// Like [`parse`], for views that borrow from `json`
pub fn parse_borrowed<'a, T: Deserialize<'a>>(json: &'a str) -> Result<T> {
    serde_json::from_str(json).map_err(malformed)
}

fn decode_bytes(input: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(input.trim())
        .map_err(|e| Error::Codec(format!("invalid base64: {}", e)))
}

fn malformed(e: impl std::fmt::Display) -> Error {
    Error::Codec(format!("malformed payload: {}", e))
}
