//! Progressive, paginated loading of cached collections.
//!
//! A `CollectionLoader` serves one collection (tutorials or marketing
//! materials) with stale-while-revalidate semantics:
//!
//! - a fresh snapshot is shown as-is and no fetch happens;
//! - a stale or missing snapshot shows whatever is available right away and
//!   fetches page 1 in the background;
//! - `load_more` appends further pages, one fetch at a time.
//!
//! Fetches run as spawned tasks that report back over a channel. State only
//! changes when the owner calls `poll` or `settle`, so the loader has a single
//! writer. When a page-1 refresh lands it replaces the collection wholesale,
//! cancels any in-flight `load_more`, and pagination restarts from page 1.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{fetch_records, ApiError, Filter, Query, Record, RemoteClient};
use crate::models::{MarketingMaterial, Tutorial};

use super::snapshot::{CacheKey, Persisted, SnapshotCache};

// ============================================================================
// Constants
// ============================================================================

/// Items per page for partner resources.
pub const DEFAULT_PAGE_SIZE: usize = 6;

/// Upper bound on a single progressive fetch before it counts as failed.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Background results waiting to be applied. At most one refresh and one
/// load-more are live per loader, superseded ones drain quickly.
const CHANNEL_BUFFER_SIZE: usize = 8;

// ============================================================================
// Collections
// ============================================================================

/// Search term, category, and kind; changing any of them restarts pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub kind: Option<String>,
}

impl CollectionFilter {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// The unfiltered view is the only one that gets snapshotted.
    pub fn is_default(&self) -> bool {
        self.search_term().is_none() && self.category.is_none() && self.kind.is_none()
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// A record type that can be loaded progressively.
pub trait Collection: Record {
    const CACHE_KEY: CacheKey;

    /// Filtered, ordered query for this collection, without a range.
    fn query(filter: &CollectionFilter) -> Query;
}

impl Collection for Tutorial {
    const CACHE_KEY: CacheKey = CacheKey::Tutorials;

    fn query(filter: &CollectionFilter) -> Query {
        let mut query = Query::table(Self::TABLE).filter(Filter::eq("is_active", true));
        if let Some(category) = &filter.category {
            query = query.filter(Filter::eq("category", category.as_str()));
        }
        if let Some(term) = filter.search_term() {
            query = query.filter(Filter::search(&["title", "description"], term));
        }
        query.order_asc("sort_order").order_desc("created_at")
    }
}

impl Collection for MarketingMaterial {
    const CACHE_KEY: CacheKey = CacheKey::MarketingMaterials;

    fn query(filter: &CollectionFilter) -> Query {
        let mut query = Query::table(Self::TABLE).filter(Filter::eq("is_active", true));
        if let Some(kind) = &filter.kind {
            query = query.filter(Filter::eq("type", kind.as_str()));
        }
        if let Some(term) = filter.search_term() {
            query = query.filter(Filter::search(&["title", "description"], term));
        }
        query.order_asc("sort_order").order_desc("created_at")
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    /// 1-based index of the last page merged into the collection
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

impl PaginationCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            has_more: false,
        }
    }

    pub fn offset_of(&self, page: usize) -> usize {
        page.saturating_sub(1) * self.page_size
    }

    pub fn reset(&mut self) {
        self.page = 1;
        self.has_more = false;
    }

    /// Record that `page` was merged after returning `returned` rows.
    /// An exact total from the backend wins over the full-page heuristic.
    pub fn advance_to(&mut self, page: usize, returned: usize, total: Option<usize>) {
        self.page = page;
        self.has_more = match total {
            Some(total) => self.offset_of(page) + returned < total,
            None => returned == self.page_size,
        };
    }
}

// ============================================================================
// Loader
// ============================================================================

struct FetchedPage<T> {
    items: Vec<T>,
    total: Option<usize>,
}

enum LoadResult<T> {
    Refreshed {
        generation: u64,
        result: Result<FetchedPage<T>, ApiError>,
    },
    MoreLoaded {
        generation: u64,
        page: usize,
        result: Result<FetchedPage<T>, ApiError>,
    },
}

/// What `load_initial` found before any network traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialLoad {
    /// A fresh snapshot was adopted; nothing was fetched.
    Fresh,
    /// A stale snapshot is shown while page 1 refreshes in the background.
    Stale,
    /// No snapshot; prior in-memory items (possibly none) are shown while page 1 loads.
    Missing,
}

pub struct CollectionLoader<T: Collection> {
    remote: Arc<dyn RemoteClient>,
    cache: SnapshotCache,
    fetch_timeout: Duration,

    items: Vec<T>,
    cursor: PaginationCursor,
    filter: CollectionFilter,
    loaded: bool,

    /// Bumped whenever a refresh starts or lands; older results are discarded
    generation: u64,
    refresh_task: Option<JoinHandle<()>>,
    load_more_task: Option<JoinHandle<()>>,

    tx: mpsc::Sender<LoadResult<T>>,
    rx: mpsc::Receiver<LoadResult<T>>,
}

impl<T: Collection> CollectionLoader<T> {
    pub fn new(remote: Arc<dyn RemoteClient>, cache: SnapshotCache) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            remote,
            cache,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            items: Vec::new(),
            cursor: PaginationCursor::new(DEFAULT_PAGE_SIZE),
            filter: CollectionFilter::default(),
            loaded: false,
            generation: 0,
            refresh_task: None,
            load_more_task: None,
            tx,
            rx,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.cursor = PaginationCursor::new(page_size);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    // ===== Accessors =====

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.cursor.has_more
    }

    pub fn filter(&self) -> &CollectionFilter {
        &self.filter
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// True only on a first-ever load with nothing to show yet.
    pub fn is_loading(&self) -> bool {
        !self.loaded && self.is_refreshing()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_task.is_some()
    }

    pub fn is_loading_more(&self) -> bool {
        self.load_more_task.is_some()
    }

    // ===== Operations =====

    /// Show the best data available now, refreshing page 1 in the background
    /// unless a fresh snapshot covers it.
    pub fn load_initial(&mut self) -> InitialLoad {
        let snapshot = if self.filter.is_default() {
            self.cache.read::<Vec<T>>(T::CACHE_KEY)
        } else {
            None
        };

        match snapshot {
            Some(snapshot) if snapshot.is_fresh(T::CACHE_KEY.ttl()) => {
                debug!(key = %T::CACHE_KEY, count = snapshot.data.len(), "Fresh snapshot, skipping fetch");
                let count = snapshot.data.len();
                self.items = snapshot.data;
                self.cursor.advance_to(1, count, None);
                self.loaded = true;
                InitialLoad::Fresh
            }
            Some(snapshot) => {
                debug!(key = %T::CACHE_KEY, age = snapshot.age_minutes(), "Stale snapshot, refreshing");
                if self.items.is_empty() {
                    self.cursor.advance_to(1, snapshot.data.len(), None);
                    self.items = snapshot.data;
                }
                self.loaded = true;
                self.start_refresh();
                InitialLoad::Stale
            }
            None => {
                debug!(key = %T::CACHE_KEY, "No snapshot, fetching page 1");
                self.start_refresh();
                InitialLoad::Missing
            }
        }
    }

    /// Fetch the next page. Returns false when it was a no-op.
    pub fn load_more(&mut self) -> bool {
        if self.is_loading_more() || !self.cursor.has_more || !self.loaded {
            return false;
        }

        let page = self.cursor.page + 1;
        let query = T::query(&self.filter)
            .range(self.cursor.offset_of(page), self.cursor.page_size)
            .with_count();
        let generation = self.generation;
        debug!(key = %T::CACHE_KEY, page, "Loading more");

        let fetch = self.spawn_fetch(query, move |result| LoadResult::MoreLoaded {
            generation,
            page,
            result,
        });
        self.load_more_task = Some(fetch);
        true
    }

    /// Change search/category/kind; resets to page 1 and refetches.
    pub fn set_filter(&mut self, filter: CollectionFilter) {
        if filter == self.filter {
            return;
        }
        self.filter = filter;
        self.cancel_load_more();
        self.cursor.reset();
        self.start_refresh();
    }

    /// Clear this collection's snapshot; in-memory items stay.
    pub fn invalidate(&self) {
        self.cache.invalidate(T::CACHE_KEY);
    }

    /// Apply every finished background result without waiting.
    /// Returns how many results were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.rx.try_recv() {
            self.apply(result);
            applied += 1;
        }
        applied
    }

    /// Wait for the outstanding refresh and load-more, applying their results.
    pub async fn settle(&mut self) {
        while self.is_refreshing() || self.is_loading_more() {
            match self.rx.recv().await {
                Some(result) => self.apply(result),
                None => break,
            }
        }
    }

    // ===== Internals =====

    fn start_refresh(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        self.generation += 1;
        let generation = self.generation;
        let query = T::query(&self.filter).range(0, self.cursor.page_size).with_count();

        let fetch = self.spawn_fetch(query, move |result| LoadResult::Refreshed { generation, result });
        self.refresh_task = Some(fetch);
    }

    fn cancel_load_more(&mut self) {
        if let Some(task) = self.load_more_task.take() {
            debug!(key = %T::CACHE_KEY, "Cancelling in-flight load more");
            task.abort();
        }
    }

    fn spawn_fetch<F>(&self, query: Query, wrap: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<FetchedPage<T>, ApiError>) -> LoadResult<T> + Send + 'static,
    {
        let remote = Arc::clone(&self.remote);
        let tx = self.tx.clone();
        let timeout = self.fetch_timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, fetch_records::<T>(remote.as_ref(), &query)).await {
                Ok(Ok((items, total))) => Ok(FetchedPage { items, total }),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ApiError::Timeout(timeout.as_secs())),
            };
            if tx.send(wrap(result)).await.is_err() {
                debug!("Collection loader dropped before fetch completed");
            }
        })
    }

    fn apply(&mut self, result: LoadResult<T>) {
        match result {
            LoadResult::Refreshed { generation, result } => {
                if generation != self.generation {
                    debug!(key = %T::CACHE_KEY, "Discarding superseded refresh");
                    return;
                }
                self.refresh_task = None;
                // Pages appended against the old page 1 no longer line up
                self.cancel_load_more();
                self.generation += 1;
                self.loaded = true;
                self.cursor.reset();

                match result {
                    Ok(page) => {
                        info!(key = %T::CACHE_KEY, count = page.items.len(), total = ?page.total, "Collection refreshed");
                        self.cursor.advance_to(1, page.items.len(), page.total);
                        self.items = page.items;
                        if self.filter.is_default()
                            && self.cache.persist(T::CACHE_KEY, &self.items) == Persisted::Evicted
                        {
                            warn!(key = %T::CACHE_KEY, "Snapshot not persisted, showing in-memory data only");
                        }
                    }
                    Err(e) => {
                        warn!(key = %T::CACHE_KEY, error = %e, "Refresh failed, showing empty collection");
                        self.items.clear();
                    }
                }
            }
            LoadResult::MoreLoaded {
                generation,
                page,
                result,
            } => {
                if generation != self.generation {
                    debug!(key = %T::CACHE_KEY, page, "Discarding load more from before refresh");
                    return;
                }
                self.load_more_task = None;

                match result {
                    Ok(fetched) => {
                        debug!(key = %T::CACHE_KEY, page, count = fetched.items.len(), "Page appended");
                        self.cursor.advance_to(page, fetched.items.len(), fetched.total);
                        self.items.extend(fetched.items);
                    }
                    Err(e) => {
                        warn!(key = %T::CACHE_KEY, page, error = %e, "Load more failed, keeping current page");
                    }
                }
            }
        }
    }
}

impl<T: Collection> Drop for CollectionLoader<T> {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        self.cancel_load_more();
    }
}

// ============================================================================
// Tests
// ============================================================================
