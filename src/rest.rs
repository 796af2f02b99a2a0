//! REST API layer using Axum.
//!
//! Public reads and the credential endpoints are open; every mutation takes
//! an [`Authenticated`] extractor, and owner-scoped mutations additionally
//! pass through [`authorize_owner`] once the target record is loaded.

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{hash_password, ClaimSigner};
use crate::error::{AppError, AppResult};
use crate::guard::{authorize_owner, Authenticated};
use crate::models::{
    Account, AccountPatch, Comment, CommentView, LikeStatus, LoginRequest, NewComment, NewPost,
    PostPatch, PostView, PublicAccount, RegisterRequest, Session,
};
use crate::session::SessionIssuer;
use crate::storage::Storage;

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
pub struct AppState {
    pub storage: Storage,
    pub signer: ClaimSigner,
}

/// Generic REST response (JSON) for outcomes without a resource body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub success: bool,
    pub message: String,
}

impl RestResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Create the Axum router over an already opened store.
pub fn create_router(storage: Storage, signer: ClaimSigner) -> Router {
    let state = Arc::new(AppState { storage, signer });

    Router::new()
        .route("/health", get(health_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/me", get(me_handler))
        .route("/accounts", get(list_accounts_handler))
        .route(
            "/accounts/:id",
            get(get_account_handler)
                .put(update_account_handler)
                .delete(delete_account_handler),
        )
        .route("/posts", get(list_posts_handler).post(create_post_handler))
        .route(
            "/posts/:id",
            get(get_post_handler)
                .put(update_post_handler)
                .delete(delete_post_handler),
        )
        .route("/posts/:id/like", put(like_handler))
        .route(
            "/posts/:id/comments",
            get(list_comments_handler).post(create_comment_handler),
        )
        .route("/comments/:id", delete(delete_comment_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run CPU-bound work (bcrypt) off the async executor.
/// `Json<T>` whose rejections come back as [`AppError::Validation`], so a
/// malformed body gets the same envelope as every other failure.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}

async fn hash_blocking(password: String) -> AppResult<String> {
    blocking(move || {
        hash_password(&password).map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    })
    .await
}

/// Health check handler
async fn health_handler() -> Json<RestResponse> {
    Json(RestResponse::ok("photo blog API healthy"))
}

// --- Credentials ---

async fn register_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PublicAccount>)> {
    payload.validate()?;
    if state.storage.find_account_by_email(&payload.email)?.is_some() {
        return Err(AppError::Conflict("email already registered".to_string()));
    }

    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4().to_string(),
        username: payload.username.trim().to_string(),
        email: payload.email.trim().to_string(),
        password_hash: hash_blocking(payload.password).await?,
        image_url: payload.image_url,
        web: payload.web,
        created_at: now,
        updated_at: now,
    };
    // Uniqueness is re-checked atomically with the insert.
    state.storage.create_account(&account)?;

    tracing::info!(account = %account.id, "Account registered");
    Ok((StatusCode::CREATED, Json(account.public())))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<Session>> {
    let issuer = SessionIssuer::new(state.storage.clone(), state.signer.clone());
    let session = blocking(move || issuer.login(&payload.email, &payload.password)).await?;
    Ok(Json(session))
}

async fn me_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
) -> AppResult<Json<PublicAccount>> {
    let account = state
        .storage
        .get_account(&claims.sub)?
        .ok_or(AppError::NotFound("account"))?;
    Ok(Json(account.public()))
}

// --- Accounts ---

async fn list_accounts_handler(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<PublicAccount>>> {
    let accounts = state.storage.list_accounts()?;
    Ok(Json(accounts.iter().map(Account::public).collect()))
}

async fn get_account_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<PublicAccount>> {
    state
        .storage
        .get_account(&id)?
        .map(|account| Json(account.public()))
        .ok_or(AppError::NotFound("account"))
}

async fn update_account_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<AccountPatch>,
) -> AppResult<Json<PublicAccount>> {
    let current = state
        .storage
        .get_account(&id)?
        .ok_or(AppError::NotFound("account"))?;
    authorize_owner(&claims, &current)?;
    patch.validate()?;

    let mut updated = current.clone();
    patch.apply(&mut updated);
    if let Some(password) = patch.password {
        updated.password_hash = hash_blocking(password).await?;
    }
    updated.updated_at = Utc::now();
    state.storage.update_account(&updated)?;

    tracing::info!(account = %id, "Account updated");
    Ok(Json(updated.public()))
}

async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> AppResult<Json<RestResponse>> {
    let account = state
        .storage
        .get_account(&id)?
        .ok_or(AppError::NotFound("account"))?;
    authorize_owner(&claims, &account)?;

    let report = state.storage.delete_account_cascade(&id)?;
    tracing::info!(
        account = %id,
        posts = report.posts,
        comments = report.comments,
        "Account deleted"
    );
    Ok(Json(RestResponse::ok(format!(
        "Account \"{}\" deleted with {} posts",
        account.username, report.posts
    ))))
}

// --- Posts ---

async fn list_posts_handler(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<PostView>>> {
    let posts = state.storage.list_posts()?;
    Ok(Json(state.storage.populate_posts(posts)?))
}

async fn get_post_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<PostView>> {
    let post = state
        .storage
        .get_post(&id)?
        .ok_or(AppError::NotFound("post"))?;
    Ok(Json(state.storage.populate_post(post)?))
}

async fn create_post_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    JsonBody(payload): JsonBody<NewPost>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    payload.validate()?;
    let post = payload.into_post(Uuid::new_v4().to_string(), &claims, Utc::now());
    state.storage.create_post(&post)?;

    tracing::info!(post = %post.id, author = %claims.sub, "Post created");
    Ok((StatusCode::CREATED, Json(state.storage.populate_post(post)?)))
}

async fn update_post_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<PostPatch>,
) -> AppResult<Json<PostView>> {
    let mut post = state
        .storage
        .get_post(&id)?
        .ok_or(AppError::NotFound("post"))?;
    authorize_owner(&claims, &post)?;

    patch.apply(&mut post, Utc::now())?;
    state.storage.update_post(&post)?;

    tracing::info!(post = %id, "Post updated");
    Ok(Json(state.storage.populate_post(post)?))
}

async fn delete_post_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> AppResult<Json<RestResponse>> {
    let post = state
        .storage
        .get_post(&id)?
        .ok_or(AppError::NotFound("post"))?;
    authorize_owner(&claims, &post)?;

    let comments = state.storage.delete_post(&id)?;
    tracing::info!(post = %id, comments, "Post deleted");
    Ok(Json(RestResponse::ok(format!("Post {} deleted", id))))
}

/// Any signed-in account may like or unlike any post, its own included.
async fn like_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    let status = state.storage.toggle_like(&id, &claims.sub)?;
    tracing::debug!(post = %id, subject = %claims.sub, liked = status.liked, "Like toggled");
    Ok(Json(status))
}

// --- Comments ---

async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<CommentView>>> {
    if state.storage.get_post(&post_id)?.is_none() {
        return Err(AppError::NotFound("post"));
    }
    let comments = state.storage.comments_for_post(&post_id)?;
    Ok(Json(state.storage.populate_comments(comments)?))
}

async fn create_comment_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(post_id): Path<String>,
    JsonBody(payload): JsonBody<NewComment>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    payload.validate()?;
    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        post_id,
        author_id: claims.sub.clone(),
        text: payload.text.trim().to_string(),
        created_at: now,
        updated_at: now,
    };
    state.storage.create_comment(&comment)?;

    let author = state.storage.get_account(&claims.sub)?.map(|a| a.public());
    Ok((StatusCode::CREATED, Json(CommentView { comment, author })))
}

async fn delete_comment_handler(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> AppResult<Json<RestResponse>> {
    let comment = state
        .storage
        .get_comment(&id)?
        .ok_or(AppError::NotFound("comment"))?;
    authorize_owner(&claims, &comment)?;

    state.storage.delete_comment(&id)?;
    Ok(Json(RestResponse::ok("Comment deleted")))
}
