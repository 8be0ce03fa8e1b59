//! The lesson catalog: categories of videos, each video carrying tags and
//! assertions to check while watching.
//!
//! The catalog is written once from a JSON file ([`seed`]) and then held
//! in memory by [`CategoryCache`].

pub mod cache;
pub mod seed;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use cache::CategoryCache;
pub use seed::{SeedSummary, seed_catalog, seed_categories};

/// A group of videos shown together, ordered by `priority`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub videos: Vec<Video>,
}

impl Category {
    /// Whether any video in this category carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.videos.iter().any(|v| v.tags.contains(tag))
    }
}

/// A single lesson video. `slug` is its global identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

/// Something the viewer should verify, with optional hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub title: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Overall lesson statistics, kept as the opaque document it was stored as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonStats(pub serde_json::Value);

impl LessonStats {
    /// Read one named counter, if the blob has it.
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(serde_json::Value::as_i64)
    }
}

/// Order categories by ascending priority. Ties keep their load order.
pub fn sort_by_priority(categories: &mut [Category]) {
    categories.sort_by(|a, b| a.priority.total_cmp(&b.priority));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn category(title: &str, priority: f64) -> Category {
        Category {
            title: title.to_string(),
            description: String::new(),
            priority,
            videos: Vec::new(),
        }
    }

    #[test]
    fn sort_is_stable_and_ascending() {
        let mut cats = vec![
            category("c", 3.0),
            category("a1", 1.0),
            category("b", 2.0),
            category("a2", 1.0),
        ];
        sort_by_priority(&mut cats);
        let titles: Vec<_> = cats.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["a1", "a2", "b", "c"]);
    }

    #[test]
    fn deserializes_catalog_documents_with_defaults() {
        let cat: Category = serde_json::from_value(json!({
            "title": "Basics",
            "priority": 2,
            "videos": [{
                "slug": "intro-101",
                "title": "Intro",
                "tags": ["beginner", "beginner"],
                "assertions": [{ "title": "Builds" }]
            }]
        }))
        .unwrap();

        assert_eq!(cat.priority, 2.0);
        assert_eq!(cat.videos[0].tags.len(), 1);
        assert!(cat.videos[0].assertions[0].hints.is_empty());
        assert!(cat.has_tag("beginner"));
        assert!(!cat.has_tag("Beginner"));
    }

    #[test]
    fn stats_counters() {
        let stats = LessonStats(json!({ "videos": 12, "label": "x" }));
        assert_eq!(stats.counter("videos"), Some(12));
        assert_eq!(stats.counter("label"), None);
        assert_eq!(stats.counter("missing"), None);
    }
}
