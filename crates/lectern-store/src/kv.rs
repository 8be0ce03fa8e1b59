//! The key-value store contract.
//!
//! Everything above the storage layer talks to a [`KeyValueStore`]. Keys
//! are flat strings; values are JSON documents, integer counters, or
//! string sets. Patterns follow glob semantics (`*`, `?`, `[...]`) and are
//! case-sensitive.
//!
//! Enumeration (`keys`, `get_all_matching`) returns keys in the order they
//! were first written.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// The storage primitives consumed by the aggregation layer.
///
/// Each method is a single round-trip. No operation spans more than one
/// key atomically except where noted.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored at `key`, or `None` if the key is absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Store `value` at `key`, replacing whatever was there.
    async fn set(&self, key: &str, value: &Value) -> StoreResult<()>;

    /// Atomically add one to the integer at `key` and return the new value.
    ///
    /// A missing key counts from zero.
    async fn increment(&self, key: &str) -> StoreResult<i64>;

    /// Insert `member` into the set at `key`. Returns `true` if it was new.
    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// All members of the set at `key`, in insertion order.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Values of every `{prefix}:*` key, in enumeration order.
    async fn get_all_matching(&self, prefix: &str) -> StoreResult<Vec<Value>>;

    /// Keys matching the glob `pattern`, in enumeration order.
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Number of keys matching the glob `pattern`.
    async fn count(&self, pattern: &str) -> StoreResult<u64>;

    /// Delete every key matching `pattern`, returning how many were removed.
    async fn delete_matching(&self, pattern: &str) -> StoreResult<u64>;
}

/// Escape glob metacharacters so `literal` only matches itself when
/// embedded in a pattern.
pub fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        match c {
            '*' => out.push_str("[*]"),
            '?' => out.push_str("[?]"),
            '[' => out.push_str("[[]"),
            other => out.push(other),
        }
    }
    out
}
