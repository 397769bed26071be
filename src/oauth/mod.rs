//! OAuth 2.0 client-credentials support for the LibApps API
//!
//! Features:
//! - Client-credentials token exchange
//! - In-memory token reuse with early refresh
//! - Invalidation when upstream rejects a token

mod client;
mod storage;

pub use client::{ClientCredentials, IssuedToken, TokenSource};
pub use storage::{TokenCache, TokenInfo};
