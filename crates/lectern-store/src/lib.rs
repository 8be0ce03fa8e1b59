//! # lectern-store
//!
//! Storage layer for Lectern.
//!
//! Provides the [`KeyValueStore`] contract the aggregation layer is
//! written against, a SQLite-backed implementation of it, and an
//! in-process memo cache built on `moka`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  MemoCache (moka, populate-once)        │
//! ├─────────────────────────────────────────┤
//! │  KeyValueStore (async trait)            │
//! │    └── SqliteKv (kv_entries + members)  │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL)                │
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use lectern_store::{KeyValueStore, SqliteKv};
//!
//! let kv = SqliteKv::open("data/lectern.db").await?;
//! kv.increment("user:alice:login_count").await?;
//! let users = kv.keys("user:*:info").await?;
//! ```

pub mod cache;
pub mod db;
pub mod error;
pub mod kv;
pub mod migration;
pub mod sqlite_kv;

// ── re-exports ───────────────────────────────────────────────────────

pub use cache::{CacheStats, MemoCache};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use kv::{KeyValueStore, escape_glob};
pub use sqlite_kv::SqliteKv;
