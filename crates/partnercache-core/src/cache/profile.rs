use tracing::{debug, warn};

use crate::api::{fetch_records, ApiError, Filter, Query, Record, RemoteClient};
use crate::models::PartnerProfile;

use super::snapshot::{CacheKey, SnapshotCache};

/// Load the partner row for `user_id`, preferring a fresh snapshot.
///
/// A fresh snapshot for the same user is returned without a remote call.
/// Otherwise the row is fetched and snapshotted. If that fetch fails and a
/// stale snapshot for the same user exists, the stale copy is returned
/// instead of the error. `Ok(None)` means the user has no partner row yet.
pub async fn load_partner_profile(
    remote: &dyn RemoteClient,
    cache: &SnapshotCache,
    user_id: &str,
) -> Result<Option<PartnerProfile>, ApiError> {
    let cached = cache
        .read::<PartnerProfile>(CacheKey::PartnerData)
        .filter(|s| s.data.user_id == user_id);

    if let Some(snapshot) = &cached {
        if snapshot.is_fresh(CacheKey::PartnerData.ttl()) {
            debug!(user_id, "Partner profile served from snapshot");
            return Ok(Some(snapshot.data.clone()));
        }
    }

    let query = Query::table(PartnerProfile::TABLE)
        .filter(Filter::eq("user_id", user_id))
        .range(0, 1);

    match fetch_records::<PartnerProfile>(remote, &query).await {
        Ok((rows, _)) => {
            let profile = rows.into_iter().next();
            match &profile {
                Some(profile) => {
                    cache.persist(CacheKey::PartnerData, profile);
                }
                None => cache.invalidate(CacheKey::PartnerData),
            }
            Ok(profile)
        }
        Err(e) => match cached {
            Some(snapshot) => {
                warn!(user_id, error = %e, "Partner profile fetch failed, using stale snapshot");
                Ok(Some(snapshot.data))
            }
            None => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::{MemoryClient, Operation};
    use crate::cache::snapshot::Snapshot;
    use crate::cache::store::{MemoryStore, SnapshotStore};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn partner_row(user_id: &str, name: &str) -> Value {
        json!({
            "id": format!("p-{}", user_id),
            "user_id": user_id,
            "full_name": name,
            "email": "partner@example.com",
            "status": "approved",
            "created_at": "2026-09-01T10:00:00Z"
        })
    }

    fn seed_snapshot(store: &MemoryStore, row: Value, age_minutes: i64) {
        let snapshot = Snapshot {
            data: row,
            timestamp: Utc::now() - Duration::minutes(age_minutes),
        };
        store
            .set(CacheKey::PartnerData.as_str(), &serde_json::to_string(&snapshot).unwrap())
            .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skips_fetch() {
        let remote = MemoryClient::new().with_rows("partners", vec![partner_row("u1", "Remote")]);
        let store = Arc::new(MemoryStore::new());
        seed_snapshot(&store, partner_row("u1", "Cached"), 10);
        let cache = SnapshotCache::new(store);

        let profile = load_partner_profile(&remote, &cache, "u1").await.unwrap().unwrap();
        assert_eq!(profile.full_name, "Cached");
        assert_eq!(remote.calls("partners", Operation::Query), 0);
    }

    #[tokio::test]
    async fn test_profile_ttl_is_thirty_minutes() {
        let remote = MemoryClient::new().with_rows("partners", vec![partner_row("u1", "Remote")]);
        let store = Arc::new(MemoryStore::new());
        seed_snapshot(&store, partner_row("u1", "Cached"), 45);
        let cache = SnapshotCache::new(store);

        let profile = load_partner_profile(&remote, &cache, "u1").await.unwrap().unwrap();
        assert_eq!(profile.full_name, "Remote");
        let snapshot = cache.read_fresh::<PartnerProfile>(CacheKey::PartnerData).unwrap();
        assert_eq!(snapshot.data.full_name, "Remote");
    }

    #[tokio::test]
    async fn test_snapshot_for_other_user_is_ignored() {
        let remote = MemoryClient::new().with_rows("partners", vec![partner_row("u2", "Second")]);
        let store = Arc::new(MemoryStore::new());
        seed_snapshot(&store, partner_row("u1", "First"), 1);
        let cache = SnapshotCache::new(store);

        let profile = load_partner_profile(&remote, &cache, "u2").await.unwrap().unwrap();
        assert_eq!(profile.full_name, "Second");
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_stale_snapshot() {
        let remote = MemoryClient::new();
        remote.fail_next("partners", "offline");
        let store = Arc::new(MemoryStore::new());
        seed_snapshot(&store, partner_row("u1", "Stale"), 120);
        let cache = SnapshotCache::new(store);

        let profile = load_partner_profile(&remote, &cache, "u1").await.unwrap().unwrap();
        assert_eq!(profile.full_name, "Stale");
    }

    #[tokio::test]
    async fn test_missing_partner_row() {
        let remote = MemoryClient::new();
        let cache = SnapshotCache::new(Arc::new(MemoryStore::new()));
        assert!(load_partner_profile(&remote, &cache, "nobody").await.unwrap().is_none());

        remote.fail_next("partners", "offline");
        assert!(load_partner_profile(&remote, &cache, "nobody").await.is_err());
    }
}
