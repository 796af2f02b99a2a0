//! Seed script for the photo blog store
//!
//! Creates two demo accounts (password `Demo1234`), a few posts across the
//! categories, comments and likes. Safe to rerun: existing accounts are reused.
//! Run: cargo run --bin load_data [-- <data dir>]

use chrono::Utc;
use photo_blog::auth::hash_password;
use photo_blog::error::StorageError;
use photo_blog::models::{Account, Category, Claims, Comment, NewPost, PhotoSettings};
use photo_blog::storage::Storage;
use uuid::Uuid;

const DEMO_PASSWORD: &str = "Demo1234";

fn ensure_account(storage: &Storage, username: &str, email: &str) -> anyhow::Result<Account> {
    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: hash_password(DEMO_PASSWORD)?,
        image_url: None,
        web: Some(format!("https://{username}.example")),
        created_at: now,
        updated_at: now,
    };
    match storage.create_account(&account) {
        Ok(()) => Ok(account),
        Err(StorageError::DuplicateEmail) | Err(StorageError::DuplicateUsername) => storage
            .find_account_by_email(email)?
            .ok_or_else(|| anyhow::anyhow!("username {username} is taken by another email")),
        Err(e) => Err(e.into()),
    }
}

fn as_claims(account: &Account) -> Claims {
    Claims {
        sub: account.id.clone(),
        username: account.username.clone(),
        image_url: account.image_url.clone(),
        iat: 0,
        exp: 0,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "photo_blog_data".to_string());
    let storage = Storage::open(&path)?;

    let ana = ensure_account(&storage, "ana", "ana@demo.example")?;
    let bob = ensure_account(&storage, "bob", "bob@demo.example")?;

    let drafts = [
        (
            &ana,
            NewPost {
                title: "Harbour at dusk".to_string(),
                description: "Long exposure from the pier".to_string(),
                image_url: "https://img.demo.example/harbour.jpg".to_string(),
                category: Category::Photography,
                photo: PhotoSettings {
                    aperture: Some("f/8".to_string()),
                    speed: Some("30s".to_string()),
                    iso: Some("100".to_string()),
                },
            },
        ),
        (
            &bob,
            NewPost {
                title: "Paper city".to_string(),
                description: "Collage from old transit maps".to_string(),
                image_url: "https://img.demo.example/paper-city.jpg".to_string(),
                category: Category::Collage,
                photo: PhotoSettings::default(),
            },
        ),
        (
            &bob,
            NewPost {
                title: "Studio notes".to_string(),
                description: "Sketches before the next series".to_string(),
                image_url: "https://img.demo.example/notes.jpg".to_string(),
                category: Category::Other,
                photo: PhotoSettings::default(),
            },
        ),
    ];

    let mut created = 0;
    for (author, draft) in drafts {
        draft.validate()?;
        let post = draft.into_post(Uuid::new_v4().to_string(), &as_claims(author), Utc::now());
        storage.create_post(&post)?;

        let reader = if author.id == ana.id { &bob } else { &ana };
        let now = Utc::now();
        storage.create_comment(&Comment {
            id: Uuid::new_v4().to_string(),
            post_id: post.id.clone(),
            author_id: reader.id.clone(),
            text: format!("Great work, {}!", author.username),
            created_at: now,
            updated_at: now,
        })?;
        storage.toggle_like(&post.id, &reader.id)?;
        created += 1;
    }

    storage.flush()?;
    tracing::info!(
        posts = created,
        "Seeded demo content into {} (log in as ana@demo.example / {})",
        path,
        DEMO_PASSWORD
    );
    Ok(())
}
