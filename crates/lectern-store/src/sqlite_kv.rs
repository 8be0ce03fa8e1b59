//! SQLite implementation of [`KeyValueStore`].
//!
//! Scalar and JSON values live in `kv_entries` as JSON text. Sets are an
//! entry of kind `set` whose members live in `kv_set_members`, deleted by
//! cascade with their entry. `id` order on `kv_entries` is first-insertion
//! order, which is the enumeration order of the store.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::kv::{KeyValueStore, escape_glob};

const KIND_VALUE: &str = "value";
const KIND_SET: &str = "set";

/// Key-value store persisted in SQLite.
#[derive(Clone)]
pub struct SqliteKv {
    db: Database,
}

impl SqliteKv {
    /// Wrap an already-migrated database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the database file at `path`, migrating it if needed.
    pub async fn open(path: impl AsRef<std::path::Path> + Send + 'static) -> StoreResult<Self> {
        let db = Database::open_and_migrate(path).await?;
        Ok(Self::new(db))
    }

    /// A fresh, migrated, in-memory store.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let db = Database::open_in_memory()?;
        db.run_migrations().await?;
        Ok(Self::new(db))
    }
}

/// An existing row of `kv_entries`.
struct Entry {
    id: i64,
    kind: String,
    value: Option<String>,
}

fn find_entry(conn: &Connection, key: &str) -> StoreResult<Option<Entry>> {
    let entry = conn
        .query_row(
            "SELECT id, kind, value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| {
                Ok(Entry {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    value: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

fn upsert_value(conn: &Connection, key: &str, json: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO kv_entries (key, kind, value, updated_at) VALUES (?1, 'value', ?2, ?3) \
         ON CONFLICT(key) DO UPDATE SET kind = 'value', value = excluded.value, \
         updated_at = excluded.updated_at",
        params![key, json, Utc::now().timestamp()],
    )?;
    Ok(())
}

/// Parse a stored counter. Numeric strings are accepted alongside numbers.
fn parse_counter(key: &str, raw: Option<&str>) -> StoreResult<i64> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Number(n) => n.as_i64().ok_or_else(|| wrong_type(key, "integer")),
        Value::String(s) => s.parse().map_err(|_| wrong_type(key, "integer")),
        Value::Null => Ok(0),
        _ => Err(wrong_type(key, "integer")),
    }
}

#[async_trait]
impl KeyValueStore for SqliteKv {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| match find_entry(conn, &key)? {
                None => Ok(None),
                Some(entry) if entry.kind == KIND_SET => Err(wrong_type(&key, KIND_VALUE)),
                Some(Entry { value: None, .. }) => Ok(Some(Value::Null)),
                Some(Entry {
                    value: Some(raw), ..
                }) => Ok(Some(serde_json::from_str(&raw)?)),
            })
            .await
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &Value) -> StoreResult<()> {
        let key = key.to_string();
        let json = serde_json::to_string(value)?;
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                if let Some(entry) = find_entry(&tx, &key)? {
                    tx.execute(
                        "DELETE FROM kv_set_members WHERE entry_id = ?1",
                        params![entry.id],
                    )?;
                }
                upsert_value(&tx, &key, &json)?;
                tx.commit()?;
                debug!(key = %key, "value stored");
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn increment(&self, key: &str) -> StoreResult<i64> {
        let key = key.to_string();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                let current = match find_entry(&tx, &key)? {
                    None => 0,
                    Some(entry) if entry.kind == KIND_SET => {
                        return Err(wrong_type(&key, "integer"));
                    }
                    Some(entry) => parse_counter(&key, entry.value.as_deref())?,
                };
                let next = current.checked_add(1).ok_or_else(|| {
                    StoreError::InvalidArgument(format!("counter overflow at {key}"))
                })?;
                upsert_value(&tx, &key, &next.to_string())?;
                tx.commit()?;
                debug!(key = %key, value = next, "counter incremented");
                Ok(next)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        let key = key.to_string();
        let member = member.to_string();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO kv_entries (key, kind, value, updated_at) \
                     VALUES (?1, 'set', NULL, ?2) ON CONFLICT(key) DO NOTHING",
                    params![key, Utc::now().timestamp()],
                )?;
                let entry = find_entry(&tx, &key)?
                    .ok_or_else(|| StoreError::InvalidArgument(format!("set {key} vanished")))?;
                if entry.kind != KIND_SET {
                    return Err(wrong_type(&key, KIND_SET));
                }
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO kv_set_members (entry_id, member) VALUES (?1, ?2)",
                    params![entry.id, member],
                )?;
                tx.commit()?;
                debug!(key = %key, inserted = inserted > 0, "set member added");
                Ok(inserted > 0)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let entry = match find_entry(conn, &key)? {
                    None => return Ok(Vec::new()),
                    Some(entry) if entry.kind != KIND_SET => {
                        return Err(wrong_type(&key, KIND_SET));
                    }
                    Some(entry) => entry,
                };
                let mut stmt = conn.prepare(
                    "SELECT member FROM kv_set_members WHERE entry_id = ?1 ORDER BY id",
                )?;
                let members = stmt
                    .query_map(params![entry.id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(members)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn get_all_matching(&self, prefix: &str) -> StoreResult<Vec<Value>> {
        let pattern = format!("{}:*", escape_glob(prefix));
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT value FROM kv_entries \
                     WHERE key GLOB ?1 AND kind = 'value' ORDER BY id",
                )?;
                let raws = stmt
                    .query_map(params![pattern], |row| row.get::<_, Option<String>>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                raws.into_iter()
                    .map(|raw| -> StoreResult<Value> {
                        match raw {
                            Some(raw) => Ok(serde_json::from_str(&raw)?),
                            None => Ok(Value::Null),
                        }
                    })
                    .collect()
            })
            .await
    }

    #[instrument(skip(self))]
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let pattern = pattern.to_string();
        self.db
            .execute(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT key FROM kv_entries WHERE key GLOB ?1 ORDER BY id")?;
                let keys = stmt
                    .query_map(params![pattern], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn count(&self, pattern: &str) -> StoreResult<u64> {
        let pattern = pattern.to_string();
        self.db
            .execute(move |conn| {
                let n: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM kv_entries WHERE key GLOB ?1",
                    params![pattern],
                    |row| row.get(0),
                )?;
                Ok(n as u64)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn delete_matching(&self, pattern: &str) -> StoreResult<u64> {
        let pattern = pattern.to_string();
        self.db
            .execute(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM kv_entries WHERE key GLOB ?1", params![pattern])?;
                debug!(pattern = %pattern, deleted, "keys deleted");
                Ok(deleted as u64)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup() -> SqliteKv {
        SqliteKv::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let kv = setup().await;
        assert!(kv.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_and_get_json() {
        let kv = setup().await;
        let doc = json!({ "title": "Intro", "priority": 2 });

        kv.set("category:0", &doc).await.unwrap();
        assert_eq!(kv.get("category:0").await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn set_overwrites() {
        let kv = setup().await;
        kv.set("k", &json!(1)).await.unwrap();
        kv.set("k", &json!("two")).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(json!("two")));
    }

    #[tokio::test]
    async fn increment_counts_from_zero() {
        let kv = setup().await;
        assert_eq!(kv.increment("c").await.unwrap(), 1);
        assert_eq!(kv.increment("c").await.unwrap(), 2);
        assert_eq!(kv.get("c").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn increment_accepts_numeric_strings() {
        let kv = setup().await;
        kv.set("c", &json!("41")).await.unwrap();
        assert_eq!(kv.increment("c").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn increment_rejects_documents() {
        let kv = setup().await;
        kv.set("c", &json!({ "a": 1 })).await.unwrap();
        let err = kv.increment("c").await.unwrap_err();
        assert!(matches!(err, StoreError::WrongType { .. }));
    }

    #[tokio::test]
    async fn sets_dedupe_and_keep_insertion_order() {
        let kv = setup().await;
        assert!(kv.add_to_set("s", "b").await.unwrap());
        assert!(kv.add_to_set("s", "a").await.unwrap());
        assert!(!kv.add_to_set("s", "b").await.unwrap());

        assert_eq!(kv.set_members("s").await.unwrap(), vec!["b", "a"]);
        assert!(kv.set_members("absent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn type_mismatches_are_reported() {
        let kv = setup().await;
        kv.add_to_set("s", "x").await.unwrap();
        kv.set("v", &json!(1)).await.unwrap();

        assert!(matches!(
            kv.get("s").await.unwrap_err(),
            StoreError::WrongType { .. }
        ));
        assert!(matches!(
            kv.set_members("v").await.unwrap_err(),
            StoreError::WrongType { .. }
        ));
        assert!(matches!(
            kv.add_to_set("v", "x").await.unwrap_err(),
            StoreError::WrongType { .. }
        ));
    }

    #[tokio::test]
    async fn set_replaces_a_set() {
        let kv = setup().await;
        kv.add_to_set("s", "x").await.unwrap();
        kv.set("s", &json!("plain")).await.unwrap();
        assert_eq!(kv.get("s").await.unwrap(), Some(json!("plain")));
    }

    #[tokio::test]
    async fn keys_follow_first_insertion_order() {
        let kv = setup().await;
        kv.set("user:zed:info", &json!({})).await.unwrap();
        kv.set("user:amy:info", &json!({})).await.unwrap();
        kv.set("user:amy:login_count", &json!(1)).await.unwrap();
        kv.set("user:zed:info", &json!({ "x": 1 })).await.unwrap();

        let keys = kv.keys("user:*:info").await.unwrap();
        assert_eq!(keys, vec!["user:zed:info", "user:amy:info"]);
        assert_eq!(kv.count("user:*:info").await.unwrap(), 2);
        assert_eq!(kv.count("user:*").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn glob_is_case_sensitive() {
        let kv = setup().await;
        kv.set("User:a:info", &json!({})).await.unwrap();
        assert_eq!(kv.count("user:*:info").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_all_matching_uses_prefix_literally() {
        let kv = setup().await;
        kv.set("category:0", &json!("first")).await.unwrap();
        kv.set("category:1", &json!("second")).await.unwrap();
        kv.set("categoryx", &json!("no")).await.unwrap();
        kv.set("cat*:0", &json!("star")).await.unwrap();

        let all = kv.get_all_matching("category").await.unwrap();
        assert_eq!(all, vec![json!("first"), json!("second")]);

        let starred = kv.get_all_matching("cat*").await.unwrap();
        assert_eq!(starred, vec![json!("star")]);
    }

    #[tokio::test]
    async fn delete_matching_removes_sets_too() {
        let kv = setup().await;
        kv.set("user:a:info", &json!({})).await.unwrap();
        kv.add_to_set("user:a:video_slugs_watched", "intro")
            .await
            .unwrap();
        kv.set("user:b:info", &json!({})).await.unwrap();

        assert_eq!(kv.delete_matching("user:a:*").await.unwrap(), 2);
        assert!(kv.set_members("user:a:video_slugs_watched").await.unwrap().is_empty());
        assert_eq!(kv.count("user:*").await.unwrap(), 1);
    }
}
