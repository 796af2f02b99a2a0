//! Request authorization: bearer claim extraction and ownership checks.
//!
//! Every mutating handler takes an [`Authenticated`] argument, which rejects
//! the request before the body is read or storage is touched. Handlers that
//! change an owned resource then call [`authorize_owner`] on the loaded record.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;

use crate::auth::ClaimSigner;
use crate::error::AppError;
use crate::models::{Account, Claims, Comment, Post};
use crate::rest::AppState;

/// A record with exactly one owning account.
pub trait Owned {
    fn owner_id(&self) -> &str;
}

impl Owned for Account {
    fn owner_id(&self) -> &str {
        &self.id
    }
}

impl Owned for Post {
    fn owner_id(&self) -> &str {
        &self.author_id
    }
}

impl Owned for Comment {
    fn owner_id(&self) -> &str {
        &self.author_id
    }
}

/// The token from an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

pub fn authenticate(headers: &HeaderMap, signer: &ClaimSigner) -> Result<Claims, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    signer.verify(token).ok_or(AppError::Unauthorized)
}

pub fn authorize_owner<R: Owned>(claims: &Claims, resource: &R) -> Result<(), AppError> {
    if resource.owner_id() == claims.sub {
        Ok(())
    } else {
        tracing::warn!(
            subject = %claims.sub,
            owner = %resource.owner_id(),
            "Ownership check failed"
        );
        Err(AppError::Forbidden)
    }
}

/// Verified claims of the caller.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(&parts.headers, &state.signer) {
            Ok(claims) => Ok(Authenticated(claims)),
            Err(e) => {
                tracing::debug!(path = %parts.uri.path(), "Rejected unauthenticated request");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublicAccount;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};

    fn signer() -> ClaimSigner {
        ClaimSigner::new(b"guard-test", Duration::days(6))
    }

    fn claims_for(signer: &ClaimSigner, id: &str) -> (String, Claims) {
        let now = Utc::now();
        signer
            .sign(&PublicAccount {
                id: id.to_string(),
                username: format!("user-{id}"),
                email: format!("{id}@x.com"),
                image_url: None,
                web: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn comment_by(author: &str) -> Comment {
        let now = Utc::now();
        Comment {
            id: "c1".to_string(),
            post_id: "p1".to_string(),
            author_id: author.to_string(),
            text: "hello".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn bearer_shape_required() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("abc")), None);
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
    }

    #[test]
    fn missing_or_bad_token_is_unauthorized() {
        let signer = signer();
        assert!(matches!(
            authenticate(&HeaderMap::new(), &signer),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&headers("Bearer nonsense"), &signer),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn valid_token_yields_claims() {
        let signer = signer();
        let (token, issued) = claims_for(&signer, "a1");
        let claims = authenticate(&headers(&format!("Bearer {token}")), &signer).unwrap();
        assert_eq!(claims, issued);
    }

    #[test]
    fn owner_passes_and_stranger_is_forbidden() {
        let signer = signer();
        let (_, ana) = claims_for(&signer, "a1");
        let (_, bob) = claims_for(&signer, "b1");
        let comment = comment_by("a1");
        assert!(authorize_owner(&ana, &comment).is_ok());
        assert!(matches!(authorize_owner(&bob, &comment), Err(AppError::Forbidden)));
    }
}
