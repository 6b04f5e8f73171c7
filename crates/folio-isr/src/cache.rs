//! Cache entry types and utilities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long an entry stays fresh
///
/// Serialized the way page modules declare it: a number of seconds, or
/// `false` for an entry that is never revalidated. `true` reads as one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RevalidateRepr", into = "RevalidateRepr")]
pub enum Revalidate {
    /// Pinned: never stale
    Never,
    /// Stale once this many seconds have passed since generation
    After(u64),
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RevalidateRepr {
    Flag(bool),
    Seconds(u64),
}

impl From<RevalidateRepr> for Revalidate {
    fn from(repr: RevalidateRepr) -> Self {
        match repr {
            RevalidateRepr::Flag(false) => Revalidate::Never,
            RevalidateRepr::Flag(true) => Revalidate::After(1),
            RevalidateRepr::Seconds(secs) => Revalidate::After(secs),
        }
    }
}

impl From<Revalidate> for RevalidateRepr {
    fn from(value: Revalidate) -> Self {
        match value {
            Revalidate::Never => RevalidateRepr::Flag(false),
            Revalidate::After(secs) => RevalidateRepr::Seconds(secs),
        }
    }
}

impl Revalidate {
    pub fn from_duration(duration: Duration) -> Self {
        Revalidate::After(duration.as_secs())
    }

    /// Seconds until stale, `None` when pinned
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Revalidate::Never => None,
            Revalidate::After(secs) => Some(*secs),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Revalidate::Never)
    }
}

/// A rendered page: markup plus the page data it was rendered from
///
/// Entries are immutable once built. A regeneration produces a new entry that
/// replaces the old one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalized path this entry was rendered for
    pub key: String,

    /// The HTML content
    pub markup: String,

    /// Serialized page data, served alone by the page-data endpoint
    pub page_data: serde_json::Value,

    pub revalidate: Revalidate,

    /// When the entry was generated
    pub generated_at: DateTime<Utc>,

    #[serde(default)]
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Create a new entry generated now
    pub fn new(
        key: impl Into<String>,
        markup: impl Into<String>,
        page_data: serde_json::Value,
        revalidate: Revalidate,
    ) -> Self {
        let markup = markup.into();
        let size_bytes = markup.len() + page_data.to_string().len();
        Self {
            key: key.into(),
            markup,
            page_data,
            revalidate,
            generated_at: Utc::now(),
            metadata: EntryMetadata {
                size_bytes,
                ..Default::default()
            },
        }
    }

    /// Check if the entry is stale at `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match self.revalidate {
            Revalidate::Never => false,
            Revalidate::After(secs) => {
                let age = now
                    .signed_duration_since(self.generated_at)
                    .to_std()
                    .unwrap_or(Duration::from_secs(0));
                age >= Duration::from_secs(secs)
            }
        }
    }

    /// Check if the entry is stale
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.generated_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Approximate in-memory size, used by the memory backend's budget
    pub fn size_bytes(&self) -> usize {
        if self.metadata.size_bytes > 0 {
            self.metadata.size_bytes
        } else {
            self.markup.len()
        }
    }
}

/// Bookkeeping carried alongside an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EntryMetadata {
    /// How many entries this key had before this one
    pub regenerations: u64,

    /// Size of markup plus serialized page data in bytes
    pub size_bytes: usize,
}

/// Statistics for the regeneration cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh entries served
    pub hits: u64,

    /// Stale entries served while a regeneration was scheduled
    pub stale_hits: u64,

    /// Lookups that found nothing
    pub misses: u64,

    /// Completed regenerations that wrote the store
    pub regenerations: u64,

    /// Regenerations that failed
    pub failures: u64,
}

impl CacheStats {
    /// Calculate cache hit rate, counting stale hits as hits
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
