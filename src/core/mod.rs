//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod context;
pub mod log;
pub mod price;
pub mod stock;

// Re-export main types for cleaner imports
pub use cache::{CacheStats, PriceCache};
pub use context::ClientContext;
pub use price::{FetchError, PriceProvider};
pub use stock::Stock;
