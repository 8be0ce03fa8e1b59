//! In-memory category tree with a per-tag memo.
//!
//! The loaded tree and its tag memo travel together in one immutable
//! snapshot. A reload builds a new snapshot and swaps it in, so a memo
//! can never outlive the tree it was computed from.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use lectern_store::{KeyValueStore, MemoCache};
use tracing::{debug, info, instrument, warn};

use crate::catalog::seed::seed_catalog;
use crate::catalog::{Category, LessonStats, Video, sort_by_priority};
use crate::error::CoreResult;
use crate::keys;

/// One loaded generation of the catalog.
struct CatalogSnapshot {
    categories: Arc<Vec<Category>>,
    by_tag: MemoCache<Vec<Category>>,
}

impl CatalogSnapshot {
    fn new(categories: Vec<Category>) -> Self {
        Self {
            categories: Arc::new(categories),
            by_tag: MemoCache::new("categories_by_tag"),
        }
    }

    fn matching(&self, tag: &str) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|c| c.has_tag(tag))
            .cloned()
            .collect()
    }
}

/// The category tree, loaded from the store and held for the life of the
/// process.
///
/// Tag queries are memoized per literal tag string and never evicted;
/// only [`CategoryCache::reload`] drops them.
pub struct CategoryCache {
    store: Arc<dyn KeyValueStore>,
    snapshot: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl CategoryCache {
    /// An empty cache reading from `store`. Call [`CategoryCache::load`]
    /// before querying.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(None),
        }
    }

    /// Seed the store from the catalog file, load the tree and read the
    /// lesson statistics.
    #[instrument(skip_all)]
    pub async fn init(&self, catalog_path: impl AsRef<Path>) -> CoreResult<Option<LessonStats>> {
        let catalog_path = catalog_path.as_ref();
        info!(path = %catalog_path.display(), "initializing catalog");
        seed_catalog(self.store.as_ref(), catalog_path).await?;
        self.load().await?;
        self.load_stats().await
    }

    /// Fetch every category from the store, sort by priority and make it
    /// the current tree.
    ///
    /// On failure the previously loaded tree, if any, stays in place.
    #[instrument(skip(self))]
    pub async fn load(&self) -> CoreResult<Arc<Vec<Category>>> {
        let docs = self.store.get_all_matching(keys::CATEGORY_PREFIX).await?;
        let mut categories = docs
            .into_iter()
            .map(serde_json::from_value::<Category>)
            .collect::<Result<Vec<_>, _>>()?;
        sort_by_priority(&mut categories);

        let videos: usize = categories.iter().map(|c| c.videos.len()).sum();
        let snapshot = Arc::new(CatalogSnapshot::new(categories));
        let tree = Arc::clone(&snapshot.categories);

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        info!(categories = tree.len(), videos, "category tree loaded");
        Ok(tree)
    }

    /// Load the tree again, discarding every memoized tag query.
    pub async fn reload(&self) -> CoreResult<Arc<Vec<Category>>> {
        debug!("reloading category tree");
        self.load().await
    }

    /// Whether a tree has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// The full tree, ordered by priority. Empty before the first load.
    pub fn categories(&self) -> Arc<Vec<Category>> {
        match self.current() {
            Some(snapshot) => Arc::clone(&snapshot.categories),
            None => Arc::new(Vec::new()),
        }
    }

    /// Categories holding at least one video tagged `tag`, in tree order.
    ///
    /// The result for each tag is computed once and shared. Unknown tags
    /// memoize an empty list. Before the first load this returns an empty
    /// list without memoizing it.
    pub fn by_tag(&self, tag: &str) -> Arc<Vec<Category>> {
        let Some(snapshot) = self.current() else {
            warn!(tag, "category tree queried before load");
            return Arc::new(Vec::new());
        };
        snapshot
            .by_tag
            .get_or_insert_with(tag, || snapshot.matching(tag))
    }

    /// Look a single video up by slug, straight from the store.
    #[instrument(skip(self))]
    pub async fn get_video(&self, slug: &str) -> CoreResult<Option<Video>> {
        match self.store.get(&keys::video(slug)).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Read the opaque lesson statistics blob.
    #[instrument(skip(self))]
    pub async fn load_stats(&self) -> CoreResult<Option<LessonStats>> {
        let stats = self.store.get(keys::VIDEO_STATS_KEY).await?;
        Ok(stats.map(LessonStats))
    }

    fn current(&self) -> Option<Arc<CatalogSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_store::SqliteKv;
    use serde_json::json;

    async fn store_with(categories: serde_json::Value) -> Arc<dyn KeyValueStore> {
        let kv = SqliteKv::open_in_memory().await.unwrap();
        for (i, cat) in categories.as_array().unwrap().iter().enumerate() {
            kv.set(&keys::category(i), cat).await.unwrap();
        }
        Arc::new(kv)
    }

    fn cat(title: &str, priority: i64, tags: &[&str]) -> serde_json::Value {
        json!({
            "title": title,
            "priority": priority,
            "videos": [{ "slug": format!("{title}-1"), "title": title, "tags": tags }]
        })
    }

    #[tokio::test]
    async fn queries_before_load_are_empty() {
        let cache = CategoryCache::new(store_with(json!([])).await);
        assert!(!cache.is_loaded());
        assert!(cache.categories().is_empty());
        assert!(cache.by_tag("rust").is_empty());
    }

    #[tokio::test]
    async fn load_sorts_by_priority() {
        let store = store_with(json!([
            cat("three", 3, &["x"]),
            cat("one", 1, &["x"]),
            cat("two", 2, &["y"]),
        ]))
        .await;
        let cache = CategoryCache::new(store);

        let tree = cache.load().await.unwrap();
        let titles: Vec<_> = tree.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["one", "two", "three"]);
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn by_tag_is_memoized_per_literal_tag() {
        let store = store_with(json!([cat("a", 1, &["Rust"]), cat("b", 2, &["rust"])])).await;
        let cache = CategoryCache::new(store);
        cache.load().await.unwrap();

        let first = cache.by_tag("rust");
        let again = cache.by_tag("rust");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, "b");

        assert_eq!(cache.by_tag("Rust")[0].title, "a");
        assert!(cache.by_tag(" rust").is_empty());
    }

    #[tokio::test]
    async fn reload_drops_memoized_results() {
        let kv = SqliteKv::open_in_memory().await.unwrap();
        kv.set(&keys::category(0), &cat("a", 1, &["t"])).await.unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(kv.clone());
        let cache = CategoryCache::new(store);
        cache.load().await.unwrap();
        let before = cache.by_tag("t");
        assert_eq!(before.len(), 1);

        kv.set(&keys::category(1), &cat("b", 2, &["t"])).await.unwrap();
        assert!(Arc::ptr_eq(&before, &cache.by_tag("t")));

        cache.reload().await.unwrap();
        assert_eq!(cache.by_tag("t").len(), 2);
    }

    #[tokio::test]
    async fn malformed_category_fails_load() {
        let store = store_with(json!([{ "description": "no title" }])).await;
        let cache = CategoryCache::new(store);
        assert!(cache.load().await.is_err());
        assert!(!cache.is_loaded());
    }
}
