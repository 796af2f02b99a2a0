use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::AppError;

const MIN_TITLE_LEN: usize = 4;
const MIN_DESCRIPTION_LEN: usize = 6;
const MIN_COMMENT_LEN: usize = 2;
const MIN_PASSWORD_LEN: usize = 7;

/// Stored account document. `password_hash` never leaves the server;
/// use [`Account::public`] for anything that does.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: Option<String>,
    pub web: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            image_url: self.image_url.clone(),
            web: self.web.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Account as seen by clients and embedded in claims.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicAccount {
    pub id: String,
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub web: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Photography,
    Collage,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Photography => "photography",
            Category::Collage => "collage",
            Category::Other => "other",
        };
        f.write_str(name)
    }
}

/// Exposure settings, only meaningful for photography posts.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PhotoSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
}

impl PhotoSettings {
    pub fn is_empty(&self) -> bool {
        self.aperture.is_none() && self.speed.is_none() && self.iso.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub category: Category,
    #[serde(flatten)]
    pub photo: PhotoSettings,
    pub author_id: String,
    pub author_name: String,
    /// Ids of the accounts that like this post.
    #[serde(default)]
    pub likes: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Signed token payload. Carries identity only, never credentials.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// What a successful login hands back to the client.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub account: PublicAccount,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<PublicAccount>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<PublicAccount>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes: usize,
}

// --- Request bodies ---

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub web: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("username", &self.username)?;
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Plain text; rehashed before it is stored.
    pub password: Option<String>,
    /// An empty string clears the field.
    pub image_url: Option<String>,
    /// An empty string clears the field.
    pub web: Option<String>,
}

impl AccountPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(username) = &self.username {
            require("username", username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }

    /// Copies the profile fields onto `account`. The password is handled by
    /// the caller since it has to be hashed first.
    pub fn apply(&self, account: &mut Account) {
        if let Some(username) = &self.username {
            account.username = username.trim().to_string();
        }
        if let Some(email) = &self.email {
            account.email = email.trim().to_string();
        }
        if let Some(image_url) = &self.image_url {
            account.image_url = non_empty(image_url);
        }
        if let Some(web) = &self.web {
            account.web = non_empty(web);
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub category: Category,
    #[serde(flatten)]
    pub photo: PhotoSettings,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_post_fields(
            &self.title,
            &self.description,
            &self.image_url,
            self.category,
            &self.photo,
        )
    }

    pub fn into_post(self, id: String, claims: &Claims, now: DateTime<Utc>) -> Post {
        Post {
            id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
            category: self.category,
            photo: self.photo,
            author_id: claims.sub.clone(),
            author_name: claims.username.clone(),
            likes: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial post update. Absent fields are left as they are.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<Category>,
    pub aperture: Option<String>,
    pub speed: Option<String>,
    pub iso: Option<String>,
}

impl PostPatch {
    /// Applies the patch and re-validates the resulting post.
    pub fn apply(self, post: &mut Post, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut next = post.clone();
        if let Some(title) = self.title {
            next.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            next.description = description.trim().to_string();
        }
        if let Some(image_url) = self.image_url {
            next.image_url = image_url.trim().to_string();
        }
        if let Some(category) = self.category {
            next.category = category;
            if category != Category::Photography {
                next.photo = PhotoSettings::default();
            }
        }
        if self.aperture.is_some() {
            next.photo.aperture = self.aperture;
        }
        if self.speed.is_some() {
            next.photo.speed = self.speed;
        }
        if self.iso.is_some() {
            next.photo.iso = self.iso;
        }
        validate_post_fields(
            &next.title,
            &next.description,
            &next.image_url,
            next.category,
            &next.photo,
        )?;
        next.updated_at = now;
        *post = next;
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NewComment {
    pub text: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.text.trim().chars().count() < MIN_COMMENT_LEN {
            return Err(AppError::Validation(format!(
                "comment must be at least {MIN_COMMENT_LEN} characters"
            )));
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    require("email", email)?;
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::Validation("email is not valid".to_string())),
    }
}

/// More than six characters, mixed case, and a digit or a symbol.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let upper = password.chars().any(|c| c.is_uppercase());
    let lower = password.chars().any(|c| c.is_lowercase());
    let digit_or_symbol = password
        .chars()
        .any(|c| c.is_ascii_digit() || !c.is_alphanumeric());
    if long_enough && upper && lower && digit_or_symbol {
        Ok(())
    } else {
        Err(AppError::Validation(
            "password must be longer than 6 characters and mix upper case, lower case and a digit or symbol"
                .to_string(),
        ))
    }
}

fn validate_post_fields(
    title: &str,
    description: &str,
    image_url: &str,
    category: Category,
    photo: &PhotoSettings,
) -> Result<(), AppError> {
    if title.trim().chars().count() < MIN_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "title must be at least {MIN_TITLE_LEN} characters"
        )));
    }
    if description.trim().chars().count() < MIN_DESCRIPTION_LEN {
        return Err(AppError::Validation(format!(
            "description must be at least {MIN_DESCRIPTION_LEN} characters"
        )));
    }
    require("image_url", image_url)?;
    if category != Category::Photography && !photo.is_empty() {
        return Err(AppError::Validation(format!(
            "aperture, speed and iso only apply to photography posts, not {category}"
        )));
    }
    Ok(())
}
