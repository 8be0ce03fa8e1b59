//! One-time seeding of the store from the static JSON catalog.
//!
//! The catalog file is a JSON array of categories with their videos
//! nested inside. Seeding writes `category:<n>` in file order, one
//! `video:<slug>` per video, and the `stats:video` summary. Re-seeding
//! replaces the previous categories and videos: slugs dropped from the
//! catalog are no longer stored.

use std::collections::HashSet;
use std::path::Path;

use lectern_store::KeyValueStore;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::catalog::Category;
use crate::error::{CoreError, CoreResult};
use crate::keys;

/// What a seeding run wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub categories: usize,
    pub videos: usize,
}

/// Read the catalog at `path` and write it into `store`.
#[instrument(skip(store))]
pub async fn seed_catalog(store: &dyn KeyValueStore, path: &Path) -> CoreResult<SeedSummary> {
    let catalog_error = |reason: String| CoreError::Catalog {
        path: path.display().to_string(),
        reason,
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| catalog_error(e.to_string()))?;
    let categories: Vec<Category> =
        serde_json::from_str(&raw).map_err(|e| catalog_error(e.to_string()))?;

    if let Some(slug) = first_duplicate_slug(&categories) {
        return Err(catalog_error(format!("duplicate video slug {slug}")));
    }

    seed_categories(store, &categories).await
}

/// Write already-parsed categories into `store`.
///
/// Slug uniqueness is the caller's concern here; a repeated slug simply
/// overwrites the earlier `video:<slug>` entry.
pub async fn seed_categories(
    store: &dyn KeyValueStore,
    categories: &[Category],
) -> CoreResult<SeedSummary> {
    let stale = store
        .delete_matching(&format!("{}:*", keys::CATEGORY_PREFIX))
        .await?
        + store.delete_matching(keys::VIDEO_PATTERN).await?;

    let mut videos = 0;
    for (index, category) in categories.iter().enumerate() {
        store
            .set(&keys::category(index), &serde_json::to_value(category)?)
            .await?;
        for video in &category.videos {
            store
                .set(&keys::video(&video.slug), &serde_json::to_value(video)?)
                .await?;
            videos += 1;
        }
    }

    let summary = SeedSummary {
        categories: categories.len(),
        videos,
    };
    store
        .set(
            keys::VIDEO_STATS_KEY,
            &json!({ "categories": summary.categories, "videos": summary.videos }),
        )
        .await?;

    info!(
        categories = summary.categories,
        videos = summary.videos,
        replaced = stale,
        "catalog seeded"
    );
    Ok(summary)
}

fn first_duplicate_slug(categories: &[Category]) -> Option<&str> {
    let mut seen = HashSet::new();
    categories
        .iter()
        .flat_map(|c| &c.videos)
        .map(|v| v.slug.as_str())
        .find(|slug| !seen.insert(*slug))
}
