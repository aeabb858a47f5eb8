//! Artifact transport: base64 payloads, remote fetch, checksum pinning.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{AurumError, Result};
use crate::model::policy::LinearPolicy;

/// Raw artifact bytes with their content checksum.
#[derive(Debug, Clone)]
pub struct ArtifactPayload {
    pub data: Vec<u8>,
    pub checksum: String,
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn encode_base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode an inline base64 artifact and compute its checksum.
pub fn decode_base64(encoded: &str) -> Result<ArtifactPayload> {
    let data = BASE64.decode(encoded.trim())?;
    let checksum = sha256_hex(&data);
    Ok(ArtifactPayload { data, checksum })
}

/// Download an artifact. When an expected checksum is supplied a mismatch
/// is fatal; a corrupted artifact must never reach inference.
pub async fn fetch_artifact(
    url: &str,
    expected_checksum: Option<&str>,
    timeout: Duration,
) -> Result<ArtifactPayload> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client.get(url).send().await?.error_for_status()?;
    let data = response.bytes().await?.to_vec();
    let checksum = sha256_hex(&data);
    if let Some(expected) = expected_checksum {
        if !expected.eq_ignore_ascii_case(&checksum) {
            return Err(AurumError::Integrity(format!(
                "artifact checksum mismatch: expected {expected}, got {checksum}"
            )));
        }
    }
    debug!(url, checksum, size = data.len(), "fetched artifact");
    Ok(ArtifactPayload { data, checksum })
}

/// Canonical serialization of a policy artifact.
pub fn policy_to_bytes(policy: &LinearPolicy) -> Result<Vec<u8>> {
    Ok(serde_json::to_value(policy)?.to_string().into_bytes())
}

pub fn policy_from_bytes(data: &[u8]) -> Result<LinearPolicy> {
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_round_trip_preserves_checksum() {
        let policy = LinearPolicy {
            weights: vec![0.25, -0.5],
            bias: 0.1,
        };
        let bytes = policy_to_bytes(&policy).unwrap();
        let encoded = encode_base64(&bytes);
        let payload = decode_base64(&encoded).unwrap();
        assert_eq!(payload.data, bytes);
        assert_eq!(payload.checksum, sha256_hex(&bytes));
        assert_eq!(policy_from_bytes(&payload.data).unwrap(), policy);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(matches!(
            decode_base64("not*base64*"),
            Err(AurumError::Base64(_))
        ));
    }

    #[test]
    fn policy_bytes_are_canonical() {
        let policy = LinearPolicy {
            weights: vec![1.0],
            bias: 0.0,
        };
        let first = policy_to_bytes(&policy).unwrap();
        let second = policy_to_bytes(&policy).unwrap();
        assert_eq!(first, second);
    }
}
