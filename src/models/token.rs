use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A single-use access grant. One record per issued URL.
///
/// The record is the unit of the single-use guarantee: it exists from the
/// moment issuance completes until exactly one redemption consumes it or the
/// reaper removes it after expiry. There is no update operation — `expires_at`
/// is set once at issuance and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque capability identifier. Generated by the issuer, never
    /// caller-supplied.
    pub id: String,
    /// Path of the protected resource this token grants access to.
    pub resource: String,
    /// Absolute expiry, epoch seconds.
    pub expires_at: i64,
}

/// Issuance request body.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRequest {
    pub resource: String,
    pub lifetime_secs: i64,
}

/// Issuance response: the signed URL plus the token id embedded in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedUrl {
    pub id: String,
    pub url: String,
    pub valid_until: i64,
}

/// Generate a fresh token id: 256 bits from the OS RNG, hex-encoded.
///
/// The id is a capability, not a row key the client gets to pick — it must be
/// unguessable, so it comes from a dedicated RNG rather than any
/// caller-supplied correlation value.
pub fn new_token_id() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn token_ids_are_pairwise_distinct() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_token_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn token_id_is_opaque_hex() {
        let id = new_token_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
