use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{SnapshotStore, StoreError};

/// Partner profile snapshots go stale after 30 minutes.
/// Matches the identity provider's session lifetime.
const PARTNER_DATA_TTL_MINUTES: i64 = 30;

/// Tutorial and marketing material snapshots go stale after 1 hour.
/// These are admin-curated and change a few times a week at most.
const RESOURCE_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Tutorials,
    MarketingMaterials,
    PartnerData,
}

impl CacheKey {
    /// Every key the cache ever writes; quota recovery evicts all of them.
    pub const ALL: [CacheKey; 3] = [
        CacheKey::Tutorials,
        CacheKey::MarketingMaterials,
        CacheKey::PartnerData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Tutorials => "tutorials_cache",
            CacheKey::MarketingMaterials => "marketing_materials_cache",
            CacheKey::PartnerData => "partner_data_cache",
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            CacheKey::PartnerData => Duration::minutes(PARTNER_DATA_TTL_MINUTES),
            CacheKey::Tutorials | CacheKey::MarketingMaterials => {
                Duration::minutes(RESOURCE_TTL_MINUTES)
            }
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamped copy of remote data: `{"data": ..., "timestamp": <epoch ms>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub data: T,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.timestamp).num_minutes()
    }

    /// Fresh iff `now - timestamp < ttl`. Future timestamps (clock skew) count as fresh.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now() - self.timestamp < ttl
    }

    /// Rounded to the nearest unit.
    pub fn age_display(&self) -> String {
        match self.age_minutes() {
            m if m < 1 => "just now".to_string(),
            m if m < 60 => format!("{}m ago", m),
            m if m < 24 * 60 => format!("{}h ago", (m + 30) / 60),
            m => format!("{}d ago", (m + 12 * 60) / (24 * 60)),
        }
    }
}

/// Outcome of a snapshot write. Neither variant is an error for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    Stored,
    /// The write hit the storage quota; every known snapshot was evicted.
    Evicted,
    /// The write failed for another reason and was skipped.
    Skipped,
}

/// Typed snapshot access over a shared store. Clone is cheap.
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Read a snapshot; unreadable or malformed entries count as absent.
    pub fn read<T: DeserializeOwned>(&self, key: CacheKey) -> Option<Snapshot<T>> {
        let raw = match self.store.get(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read snapshot");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding malformed snapshot");
                None
            }
        }
    }

    /// Read a snapshot only if it is still within its key's TTL.
    pub fn read_fresh<T: DeserializeOwned>(&self, key: CacheKey) -> Option<Snapshot<T>> {
        self.read(key).filter(|s: &Snapshot<T>| s.is_fresh(key.ttl()))
    }

    /// Write a fresh snapshot of `data`. Quota failures evict every known key.
    pub fn persist<T: Serialize>(&self, key: CacheKey, data: &T) -> Persisted {
        let contents = match serde_json::to_string(&Snapshot::new(data)) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode snapshot");
                return Persisted::Skipped;
            }
        };

        match self.store.set(key.as_str(), &contents) {
            Ok(()) => {
                debug!(key = %key, bytes = contents.len(), "Snapshot stored");
                Persisted::Stored
            }
            Err(StoreError::QuotaExceeded { needed, quota, .. }) => {
                warn!(key = %key, needed, quota, "Storage quota exceeded, evicting all snapshots");
                self.clear_all();
                Persisted::Evicted
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to store snapshot");
                Persisted::Skipped
            }
        }
    }

    /// Drop one snapshot. In-memory collections are not touched.
    pub fn invalidate(&self, key: CacheKey) {
        if let Err(e) = self.store.remove(key.as_str()) {
            warn!(key = %key, error = %e, "Failed to remove snapshot");
        }
    }

    pub fn clear_all(&self) {
        for key in CacheKey::ALL {
            self.invalidate(key);
        }
    }

    /// Helper to read just a snapshot's age, ignoring its payload shape
    fn age(&self, key: CacheKey) -> Option<String> {
        self.read::<serde_json::Value>(key).map(|s| s.age_display())
    }

    pub fn ages(&self) -> CacheAges {
        CacheAges {
            tutorials: self.age(CacheKey::Tutorials),
            marketing_materials: self.age(CacheKey::MarketingMaterials),
            partner_data: self.age(CacheKey::PartnerData),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub tutorials: Option<String>,
    pub marketing_materials: Option<String>,
    pub partner_data: Option<String>,
}

impl CacheAges {
    pub fn display(age: &Option<String>) -> &str {
        age.as_deref().unwrap_or("never")
    }

    /// The first available age, checking the partner row before resources
    pub fn last_updated(&self) -> String {
        [&self.partner_data, &self.tutorials, &self.marketing_materials]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
