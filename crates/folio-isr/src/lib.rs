//! # folio ISR - Incremental Static Regeneration
//!
//! The caching half of folio's render pipeline.
//!
//! ## Features
//!
//! - **Regeneration cache**: rendered markup plus page data per path, with a
//!   revalidation interval or pinned forever
//! - **Stale-while-revalidate**: stale entries stay servable while a
//!   background regeneration replaces them
//! - **Coalescing**: at most one regeneration per key at a time
//! - **Storage backends**: byte-bounded memory, with optional filesystem
//!   write-behind and promotion back into memory
//!
//! ## Example
//!
//! ```rust
//! use folio_isr::{CacheEntry, IsrConfig, Lookup, RegenerationCache, Revalidate};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = RegenerationCache::init(IsrConfig::default()).await.unwrap();
//!
//!     let entry = cache
//!         .regenerate("/about", || async {
//!             Ok(CacheEntry::new("/about", "<h1>About</h1>", serde_json::json!({}), Revalidate::Never))
//!         })
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(cache.lookup("/about").await, Lookup::Fresh(entry));
//!     cache.teardown().await;
//! }
//! ```

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod engine;
pub mod storage;

pub use cache::{CacheEntry, CacheStats, EntryMetadata, Revalidate};
pub use coalesce::{CoalesceError, Coalescer};
pub use config::{FilesystemConfig, IsrConfig, IsrTomlConfig, MemoryConfig, StorageBackend};
pub use engine::{preview_key, Lookup, RegenerationCache};
pub use storage::Storage;
