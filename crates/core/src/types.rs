//! Shared identifier types.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Opaque post identifier.
///
/// At the HTTP boundary a post id is an 8-character URL-safe base64 string;
/// the stored procedures take its 48-bit big-endian integer form. The core
/// never reads business meaning out of it, but it does perform the
/// conversion so a malformed id is rejected before any SQL is issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PostId(String);

/// Deserialization validates, so a post id is well-formed wherever it came
/// from -- request bodies and upstream directory responses alike.
impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        PostId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Encoded length of a post id.
const POST_ID_LEN: usize = 8;

impl PostId {
    /// Parse and validate a boundary-form post id.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.len() != POST_ID_LEN {
            return Err(CoreError::BadRequest(format!(
                "invalid post id: '{raw}' must be exactly {POST_ID_LEN} characters"
            )));
        }
        URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| CoreError::BadRequest(format!("invalid post id: '{raw}'")))?;
        Ok(Self(raw.to_owned()))
    }

    /// Re-encode the integer form produced by [`PostId::as_int`].
    pub fn from_int(value: i64) -> Self {
        let bytes = value.to_be_bytes();
        Self(URL_SAFE_NO_PAD.encode(&bytes[2..]))
    }

    /// The 48-bit integer form required by the stored procedures.
    pub fn as_int(&self) -> i64 {
        // Construction validates the encoding, so this yields six bytes.
        let decoded = URL_SAFE_NO_PAD.decode(&self.0).unwrap_or_default();
        let mut bytes = [0u8; 8];
        bytes[8 - decoded.len()..].copy_from_slice(&decoded);
        i64::from_be_bytes(bytes)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_id_decodes_to_zero() {
        let id = PostId::parse("AAAAAAAA").unwrap();
        assert_eq!(id.as_int(), 0);
    }

    #[test]
    fn int_round_trip() {
        for value in [0, 1, 64, 68_719_476_735, 281_474_976_710_655] {
            let id = PostId::from_int(value);
            assert_eq!(id.as_str().len(), 8);
            assert_eq!(PostId::parse(id.as_str()).unwrap().as_int(), value);
        }
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(PostId::parse("AAAA").is_err());
        assert!(PostId::parse("AAAAAAAAA").is_err());
        assert!(PostId::parse("").is_err());
    }

    #[test]
    fn non_base64_rejected() {
        assert!(PostId::parse("AAAA AAA").is_err());
        assert!(PostId::parse("AAAA+AAA").is_err());
    }
}
