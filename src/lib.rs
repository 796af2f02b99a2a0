//! photo_blog: REST backend for a small photo blog.
//!
//! Accounts register and log in with email and password, receive a signed
//! bearer token, and use it to publish posts, comment and like. Documents
//! live in an embedded Sled store.

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod rest;
pub mod session;
pub mod storage;
pub mod telemetry;
