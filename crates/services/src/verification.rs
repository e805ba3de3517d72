//! # E-mail verifications
//!
//! An author has at most one outstanding verification. Issuing a new one
//! replaces whatever was there; only a SHA-256 hash of the token is kept.

use std::sync::Arc;

use chrono::Duration;
use domains::{AppError, AuthorRepo, Clock, Result, UserVerification, VerificationRepo};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

/// A freshly issued verification. `token` is never stored and must be
/// handed to the author right away.
#[derive(Debug, Clone)]
pub struct IssuedVerification {
    pub verification: UserVerification,
    pub token: String,
}

pub struct VerificationService {
    verifications: Arc<dyn VerificationRepo>,
    authors: Arc<dyn AuthorRepo>,
    clock: Arc<dyn Clock>,
}

impl VerificationService {
    pub fn new(
        verifications: Arc<dyn VerificationRepo>,
        authors: Arc<dyn AuthorRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifications,
            authors,
            clock,
        }
    }

    pub async fn issue(&self, author_id: Uuid, ttl: Duration) -> Result<IssuedVerification> {
        if self.authors.get_author(author_id).await?.is_none() {
            return Err(AppError::not_found("Author", author_id));
        }

        let token = Uuid::new_v4().simple().to_string();
        let now = self.clock.now();
        let verification = UserVerification {
            id: Uuid::now_v7(),
            author_id,
            token_hash: hash_token(&token),
            expires_at: now + ttl,
            created_at: now,
        };
        self.verifications.replace_verification(&verification).await?;
        info!(author = %author_id, expires_at = %verification.expires_at, "verification issued");
        Ok(IssuedVerification { verification, token })
    }

    /// Drops any outstanding verification. Returns how many rows went away.
    pub async fn revoke(&self, author_id: Uuid) -> Result<u64> {
        self.verifications.delete_verifications(author_id).await
    }

    pub async fn pending(&self, author_id: Uuid) -> Result<Vec<UserVerification>> {
        self.verifications.verifications_for(author_id).await
    }
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
