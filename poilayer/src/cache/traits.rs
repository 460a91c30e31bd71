//! Core traits for the generic cache layer.
//!
//! The `Cache` trait provides a domain-agnostic key-value interface. The raw
//! upstream cache and the snapshot cache are both typed clients on top of it,
//! so a different backend (a relational table, a shared key-value server) can
//! be swapped in without touching the pipeline.
//!
//! # Design Principles
//!
//! - **String keys**: Human-readable for debugging, prefixed per client
//! - **Vec<u8> values**: Raw bytes, encoding is the client's concern
//! - **Replace-by-key**: `set` always replaces the whole value
//! - **Dyn-compatible**: Uses `Pin<Box<dyn Future>>` for trait object support
//!
//! # Example
//!
//! ```ignore
//! use poilayer::cache::{Cache, MemoryCacheProvider};
//!
//! let cache = MemoryCacheProvider::new(64 * 1024 * 1024, None);
//! cache.set("raw:territory", bytes).await?;
//! let value = cache.get("raw:territory").await?;
//! ```

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum ServiceCacheError {
    /// A value could not be encoded for storage.
    #[error("Failed to encode cache value for {key}: {reason}")]
    Encode { key: String, reason: String },

    /// Value exceeds maximum allowed size.
    #[error("Value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// Provider-specific error.
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Generic cache interface for key-value storage.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`. Reads and writes for unrelated
/// keys must never block each other; the only per-key writer discipline is
/// imposed above this layer by the revalidation coordinator.
///
/// # Dyn Compatibility
///
/// This trait uses `Pin<Box<dyn Future>>` for async methods so the typed
/// clients can hold an `Arc<dyn Cache>`.
pub trait Cache: Send + Sync {
    /// Store a value with the given key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `ServiceCacheError` if the backend rejects the write.
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>>;

    /// Retrieve a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if an error occurs
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>>;

    /// Delete a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the key existed and was deleted
    /// - `Ok(false)` if the key did not exist
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    /// Check if a key exists without retrieving the value.
    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    /// Remove every entry.
    fn clear(&self) -> BoxFuture<'_, Result<(), ServiceCacheError>>;

    /// Get the current size of the cache in bytes.
    fn size_bytes(&self) -> u64;

    /// Get the current number of entries in the cache.
    fn entry_count(&self) -> u64;

    /// Get the maximum configured size in bytes.
    fn max_size_bytes(&self) -> u64;
}
