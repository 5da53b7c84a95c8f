//! Verification of Svix-signed webhook deliveries.
//!
//! The signed content is `"{svix-id}.{svix-timestamp}.{body}"`, authenticated
//! with HMAC-SHA256 under the base64 key that follows the `whsec_` prefix of
//! the endpoint secret. `svix-signature` carries one or more space separated
//! `v1,<base64 mac>` entries; any one matching is enough.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const SVIX_ID_HEADER: &str = "svix-id";
pub const SVIX_TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SVIX_SIGNATURE_HEADER: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing svix headers")]
    MissingHeaders,
    #[error("Webhook secret is not valid base64")]
    InvalidSecret,
    #[error("Invalid svix timestamp")]
    InvalidTimestamp,
    #[error("Svix timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("Invalid signature")]
    NoMatchingSignature,
}

/// The three headers every Svix delivery carries.
#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SvixHeaders<'a> {
    pub fn from_headers(headers: &'a HeaderMap) -> Result<Self, SignatureError> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        match (
            get(SVIX_ID_HEADER),
            get(SVIX_TIMESTAMP_HEADER),
            get(SVIX_SIGNATURE_HEADER),
        ) {
            (Some(id), Some(timestamp), Some(signature)) => Ok(Self {
                id,
                timestamp,
                signature,
            }),
            _ => Err(SignatureError::MissingHeaders),
        }
    }
}

#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &str, tolerance: Duration) -> Result<Self, SignatureError> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| SignatureError::InvalidSecret)?;
        Ok(Self { key, tolerance })
    }

    /// Produces a `v1,<base64>` signature for the given delivery.
    pub fn sign(&self, msg_id: &str, timestamp: i64, payload: &[u8]) -> String {
        let mac = self.mac(msg_id, &timestamp.to_string(), payload);
        format!("{},{}", SIGNATURE_VERSION, STANDARD.encode(mac))
    }

    pub fn verify(&self, headers: &SvixHeaders<'_>, payload: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(headers, payload, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        headers: &SvixHeaders<'_>,
        payload: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp: i64 = headers
            .timestamp
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if (now - timestamp).unsigned_abs() > self.tolerance.as_secs() {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        let expected = self.mac(headers.id, headers.timestamp, payload);

        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|candidate| constant_time_eq(&expected, &candidate));

        if matched {
            Ok(())
        } else {
            Err(SignatureError::NoMatchingSignature)
        }
    }

    fn mac(&self, msg_id: &str, timestamp: &str, payload: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.iter().zip(b) {
        res |= x ^ y;
    }
    res == 0
}
