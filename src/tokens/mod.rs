//! Process-local access-token cache.

pub mod cache;

pub use cache::{AccessGrant, TokenCache};
