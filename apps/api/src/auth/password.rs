//! Password hashing.
//!
//! bcrypt with the library's default cost. Both functions are CPU-bound;
//! async callers run them on the blocking pool.

use anyhow::{Context, Result};
use bcrypt::DEFAULT_COST;

pub fn hash_password(plaintext: &str) -> Result<String> {
    hash_with_cost(plaintext, DEFAULT_COST)
}

fn hash_with_cost(plaintext: &str, cost: u32) -> Result<String> {
    bcrypt::hash(plaintext, cost).context("Failed to hash password")
}

/// Returns `false` on mismatch and on any verification error.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// `hash_password` on the blocking pool.
pub async fn hash_password_blocking(plaintext: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .context("Password hashing task panicked")?
}

/// `verify_password` on the blocking pool. A failed task counts as a mismatch.
pub async fn verify_password_blocking(plaintext: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&plaintext, &hash))
        .await
        .unwrap_or(false)
}
