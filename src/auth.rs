//! Password hashing and signed session claims.

use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use std::sync::Arc;

use crate::models::{Claims, PublicAccount};

/// bcrypt work factor.
pub const HASH_COST: u32 = 10;

/// One-way hash with a fresh random salt per call.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, HASH_COST)
}

/// False on any mismatch, including a stored hash that does not parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!("Stored password hash rejected: {}", e);
            false
        }
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Mints and checks HS256 claims with the process-wide secret.
/// Cheap to clone; the keys are shared.
#[derive(Clone)]
pub struct ClaimSigner {
    keys: Arc<Keys>,
    ttl: Duration,
}

impl fmt::Debug for ClaimSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ClaimSigner {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // A token is good up to its expiry second and not a moment after.
        validation.leeway = 0;
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(&self, account: &PublicAccount) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
        self.sign_at(account, Utc::now())
    }

    /// Signs claims as if issued at `issued_at`; expiry is `issued_at + ttl`.
    pub fn sign_at(
        &self,
        account: &PublicAccount,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: account.id.clone(),
            username: account.username.clone(),
            image_url: account.image_url.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)?;
        Ok((token, claims))
    }

    /// Fails closed: malformed, forged or expired tokens all yield `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.keys.decoding, &self.keys.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                None
            }
        }
    }
}
