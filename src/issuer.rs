//! Token issuance.
//!
//! Mints a fresh single-use token bound to a resource and an expiry, and
//! produces the signed URL. Ordering is the whole point here: sign first,
//! write the record, and only then disclose the URL. A signing failure leaves
//! no record behind, and a store failure withholds the already-signed URL —
//! a validly-signed URL with no record would either dead-end at the redeemer
//! or, worse, outlive the redeemer's existence check entirely.

use std::sync::Arc;

use crate::errors::AppError;
use crate::models::token::{new_token_id, AccessToken, IssueRequest, IssuedUrl};
use crate::signer::UrlSigner;
use crate::store::TokenStore;

pub struct Issuer {
    store: Arc<dyn TokenStore>,
    signer: Arc<dyn UrlSigner>,
}

impl Issuer {
    pub fn new(store: Arc<dyn TokenStore>, signer: Arc<dyn UrlSigner>) -> Self {
        Self { store, signer }
    }

    pub async fn issue(&self, req: &IssueRequest, now: i64) -> Result<IssuedUrl, AppError> {
        let resource = req.resource.trim_start_matches('/');
        if resource.is_empty() {
            return Err(AppError::InvalidParam("resource"));
        }
        if req.lifetime_secs <= 0 {
            return Err(AppError::InvalidParam("lifetime_secs"));
        }

        let expires_at = now + req.lifetime_secs;
        let id = new_token_id();

        let url = self.signer.sign(resource, &id, expires_at).await?;

        // The record must be durable before the URL is disclosed, otherwise a
        // fast client could redeem before it exists.
        self.store
            .put(&AccessToken {
                id: id.clone(),
                resource: resource.to_string(),
                expires_at,
            })
            .await?;

        tracing::info!(token_id = %id, resource = %resource, expires_at, "issued single-use URL");

        Ok(IssuedUrl {
            id,
            url,
            valid_until: expires_at,
        })
    }
}
