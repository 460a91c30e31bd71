//! Cache provider implementations.
//!
//! Each provider implements the `Cache` trait and manages its own eviction.
//!
//! # Available Providers
//!
//! - [`MemoryCacheProvider`]: In-memory LRU cache using moka

mod memory;

pub use memory::MemoryCacheProvider;
