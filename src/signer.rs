//! Signed URL generation.
//!
//! The signing collaborator turns (resource, token id, expiry) into the
//! externally usable URL. The core only depends on the [`UrlSigner`] trait;
//! [`HmacSigner`] is the built-in implementation, keyed by a signing identity
//! (`key_id`) and an HMAC-SHA256 secret.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid signing key material: {0}")]
    InvalidKey(String),
}

/// Collaborator contract: produce a signed URL for a resource, with the token
/// id embedded as the `id` query parameter so the redemption path can extract
/// it later.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(
        &self,
        resource: &str,
        token_id: &str,
        expires_at: i64,
    ) -> Result<String, SignError>;
}

#[derive(Debug)]
pub struct HmacSigner {
    domain: String,
    key_id: String,
    secret: Vec<u8>,
}

impl HmacSigner {
    /// Key material is validated once, at startup — a malformed secret is a
    /// configuration error, not something to discover on the first issuance.
    pub fn new(domain: &str, key_id: &str, hex_secret: &str) -> Result<Self, SignError> {
        let secret = hex::decode(hex_secret)
            .map_err(|e| SignError::InvalidKey(format!("signing key is not valid hex: {e}")))?;
        if secret.len() < 32 {
            return Err(SignError::InvalidKey(
                "signing key must be at least 32 bytes (64 hex chars)".into(),
            ));
        }
        Ok(Self {
            domain: domain.to_string(),
            key_id: key_id.to_string(),
            secret,
        })
    }

    /// Percent-encode a resource path, preserving `/` separators.
    fn encode_path(resource: &str) -> String {
        resource
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl UrlSigner for HmacSigner {
    async fn sign(
        &self,
        resource: &str,
        token_id: &str,
        expires_at: i64,
    ) -> Result<String, SignError> {
        let path = Self::encode_path(resource);
        let canonical = format!("/{path}?exp={expires_at}&id={token_id}&key={}", self.key_id);

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(canonical.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());

        Ok(format!(
            "https://{}/{}?id={}&exp={}&key={}&sig={}",
            self.domain, path, token_id, expires_at, self.key_id, sig
        ))
    }
}
