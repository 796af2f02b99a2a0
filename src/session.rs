//! Login: credentials in, signed session out.

use chrono::{TimeZone, Utc};

use crate::auth::{verify_password, ClaimSigner};
use crate::error::{AppError, AppResult};
use crate::models::Session;
use crate::storage::Storage;

#[derive(Clone, Debug)]
pub struct SessionIssuer {
    storage: Storage,
    signer: ClaimSigner,
}

impl SessionIssuer {
    pub fn new(storage: Storage, signer: ClaimSigner) -> Self {
        Self { storage, signer }
    }

    /// Look up by email, check the password, sign claims. Both an unknown
    /// email and a wrong password come back as `InvalidCredentials`.
    /// Runs bcrypt; call from a blocking context.
    pub fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let Some(account) = self.storage.find_account_by_email(email)? else {
            tracing::debug!("Login rejected: unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &account.password_hash) {
            tracing::debug!(account = %account.id, "Login rejected: password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        let public = account.public();
        let (access_token, claims) = self
            .signer
            .sign(&public)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))?;

        tracing::info!(account = %public.id, "Session issued");
        Ok(Session {
            access_token,
            token_type: "Bearer".to_string(),
            expires_at,
            account: public,
        })
    }
}
