//! # Request Signing
//!
//! Outbound authentication for the remote change API:
//!
//! 1. `digest = base64(HMAC-SHA256(secret, body))` (empty body hashes the empty byte string)
//! 2. `timestamp = UTC now as YYYYMMDDHH`
//! 3. `request_data = timestamp ‖ path ‖ digest`
//! 4. `signature = base64(HMAC-SHA256(secret, request_data))`
//!
//! The timestamp has hour granularity, so a signature stays valid for the rest
//! of the UTC hour it was produced in.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::constants::remote::SIGNATURE_TIMESTAMP_FORMAT;

type HmacSha256 = Hmac<Sha256>;

/// Transient signing material for one outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub timestamp_hour: String,
    pub path: String,
    pub body_digest: String,
    pub signature: String,
}

impl SignedEnvelope {
    /// Sign `body` for `path` at the current UTC hour
    pub fn sign(secret: &str, path: &str, body: &[u8]) -> Self {
        Self::sign_at(secret, path, body, Utc::now())
    }

    /// Sign `body` for `path` as of `now`
    pub fn sign_at(secret: &str, path: &str, body: &[u8], now: DateTime<Utc>) -> Self {
        let body_digest = base64_hmac_sha256(secret.as_bytes(), body);
        let timestamp_hour = signature_timestamp(now);

        let request_data = format!("{timestamp_hour}{path}{body_digest}");
        let signature = base64_hmac_sha256(secret.as_bytes(), request_data.as_bytes());

        Self {
            timestamp_hour,
            path: path.to_string(),
            body_digest,
            signature,
        }
    }
}

/// `YYYYMMDDHH` in UTC
pub fn signature_timestamp(now: DateTime<Utc>) -> String {
    now.format(SIGNATURE_TIMESTAMP_FORMAT).to_string()
}

/// Standard base64 of HMAC-SHA256(key, payload)
pub fn base64_hmac_sha256(key: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length, new_from_slice cannot fail for Sha256
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC can take key of any size"),
    };
    mac.update(payload);
    STANDARD.encode(mac.finalize().into_bytes())
}
