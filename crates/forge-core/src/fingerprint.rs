//! Deduplication fingerprints for generation requests
//!
//! A fingerprint is a SHA-256 digest of (backend kind, input,
//! parameters, sorted platform set). Two requests with the same
//! fingerprint are guaranteed to produce the same bundle for
//! deterministic backends, which is what makes result caching and
//! concurrent deduplication sound.

use crate::request::GenerationRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 based request fingerprint
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute a fingerprint from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Compute the fingerprint of a request.
    ///
    /// The caller-supplied dedup key, when present, replaces the
    /// derived input/parameter portion but the backend kind and
    /// platform set always participate: the same key requested for a
    /// different platform set is a different unit of work.
    pub fn of_request(request: &GenerationRequest) -> Self {
        let mut platforms = request.platforms.clone();
        platforms.sort();

        let mut hasher = Sha256::new();
        hasher.update(request.backend.to_string().as_bytes());
        hasher.update(b"\0");
        match &request.dedup_key {
            Some(key) => {
                hasher.update(b"key:");
                hasher.update(key.as_bytes());
            }
            None => {
                // serde_json serialization of enums/structs is stable
                // for a fixed type definition
                let input = serde_json::to_string(&request.input).unwrap_or_default();
                let params = serde_json::to_string(&request.params).unwrap_or_default();
                hasher.update(input.as_bytes());
                hasher.update(b"\0");
                hasher.update(params.as_bytes());
            }
        }
        for platform in &platforms {
            hasher.update(b"\0");
            hasher.update(platform.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Get the fingerprint as a hex string
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{BackendKind, InputPayload};

    fn request(name: &str) -> GenerationRequest {
        GenerationRequest::new(
            name,
            BackendKind::TextTo3d,
            InputPayload::Prompt("a wooden chair".to_string()),
        )
    }

    #[test]
    fn test_identical_requests_share_fingerprint() {
        // The asset name is presentation only and must not split the
        // dedup key
        let mut a = request("chair_a");
        let mut b = request("chair_b");
        a.platforms = vec!["imvu".to_string()];
        b.platforms = vec!["imvu".to_string()];
        assert_eq!(Fingerprint::of_request(&a), Fingerprint::of_request(&b));
    }

    #[test]
    fn test_platform_order_is_canonical() {
        let mut a = request("chair");
        let mut b = request("chair");
        a.platforms = vec!["imvu".to_string(), "vrchat_pc".to_string()];
        b.platforms = vec!["vrchat_pc".to_string(), "imvu".to_string()];
        assert_eq!(Fingerprint::of_request(&a), Fingerprint::of_request(&b));
    }

    #[test]
    fn test_different_input_different_fingerprint() {
        let a = request("chair");
        let mut b = request("chair");
        b.input = InputPayload::Prompt("a stone table".to_string());
        assert_ne!(Fingerprint::of_request(&a), Fingerprint::of_request(&b));
    }

    #[test]
    fn test_different_backend_different_fingerprint() {
        let a = request("chair");
        let mut b = request("chair");
        b.backend = BackendKind::Mock;
        assert_ne!(Fingerprint::of_request(&a), Fingerprint::of_request(&b));
    }

    #[test]
    fn test_dedup_key_overrides_input() {
        let mut a = request("chair");
        let mut b = request("chair");
        b.input = InputPayload::Prompt("something else entirely".to_string());
        a.dedup_key = Some("shared-key".to_string());
        b.dedup_key = Some("shared-key".to_string());
        assert_eq!(Fingerprint::of_request(&a), Fingerprint::of_request(&b));
    }

    #[test]
    fn test_dedup_key_still_split_by_platform_set() {
        let mut a = request("chair");
        let mut b = request("chair");
        a.dedup_key = Some("shared-key".to_string());
        b.dedup_key = Some("shared-key".to_string());
        a.platforms = vec!["imvu".to_string()];
        b.platforms = vec!["secondlife".to_string()];
        assert_ne!(Fingerprint::of_request(&a), Fingerprint::of_request(&b));
    }

    #[test]
    fn test_hex_output() {
        let fp = Fingerprint::from_bytes(b"hello");
        assert_eq!(fp.to_hex().len(), 64);
    }
}
