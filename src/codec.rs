//! Payload codecs.
//!
//! Every envelope records which codec encoded its payload, so producers and
//! consumers configured differently still decode each other's messages.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::BusError;

/// Serialization format for message payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Self-describing JSON (`serde_json`).
    #[default]
    Json,
    /// Compact binary (`bitcode`).
    Bitcode,
}

impl Codec {
    /// Encode a value into payload bytes.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, BusError> {
        match self {
            Codec::Json => serde_json::to_vec(value)
                .map_err(|e| BusError::Deserialization(format!("json encode: {e}"))),
            Codec::Bitcode => bitcode::serialize(value)
                .map_err(|e| BusError::Deserialization(format!("bitcode encode: {e}"))),
        }
    }

    /// Decode payload bytes into a value.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, BusError> {
        match self {
            Codec::Json => serde_json::from_slice(bytes)
                .map_err(|e| BusError::Deserialization(format!("json decode: {e}"))),
            Codec::Bitcode => bitcode::deserialize(bytes)
                .map_err(|e| BusError::Deserialization(format!("bitcode decode: {e}"))),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Json => write!(f, "json"),
            Codec::Bitcode => write!(f, "bitcode"),
        }
    }
}

impl FromStr for Codec {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            "bitcode" => Ok(Codec::Bitcode),
            other => Err(BusError::Config(format!("unknown codec: {other}"))),
        }
    }
}
