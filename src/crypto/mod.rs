//! At-rest encryption for refresh credentials.

pub mod engine;

pub use engine::CryptoEngine;
