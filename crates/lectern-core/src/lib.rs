//! # lectern-core
//!
//! Aggregation and caching over the Lectern key-value store.
//!
//! - [`CategoryCache`] holds the category tree in memory and memoizes
//!   tag queries over it.
//! - [`UserProfileAssembler`] joins a user's three stored fragments into
//!   one [`UserProfile`].
//! - [`UserDirectory`] lists every user, failing as a whole if any
//!   profile fails.
//! - [`SessionTracker`] records logins and completed lessons.
//!
//! [`Lectern`] wires all four to one store and clock.
//!
//! ```ignore
//! use std::sync::Arc;
//! use lectern_core::Lectern;
//! use lectern_store::SqliteKv;
//!
//! let lectern = Lectern::new(Arc::new(SqliteKv::open("data/lectern.db").await?));
//! lectern.catalog.init("data/videos.json").await?;
//! lectern.sessions.report_login("carol", "1.2.3.4").await?;
//! let carol = lectern.profiles.get("carol").await?;
//! ```

pub mod catalog;
pub mod clock;
pub mod error;
pub mod keys;
pub mod timespan;
pub mod users;

use std::sync::Arc;

use lectern_store::KeyValueStore;

// ── re-exports ───────────────────────────────────────────────────────

pub use catalog::{Assertion, Category, CategoryCache, LessonStats, SeedSummary, Video};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use users::{
    ProfileInfo, ProfileUpdate, SessionTracker, Timestamp, UserDirectory, UserInfo, UserProfile,
    UserProfileAssembler,
};

/// All services sharing one store and clock.
pub struct Lectern {
    pub catalog: CategoryCache,
    pub profiles: UserProfileAssembler,
    pub directory: UserDirectory,
    pub sessions: SessionTracker,
}

impl Lectern {
    /// Services on `store` using the wall clock.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let profiles = UserProfileAssembler::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            catalog: CategoryCache::new(Arc::clone(&store)),
            directory: UserDirectory::new(Arc::clone(&store), profiles.clone()),
            sessions: SessionTracker::new(store, clock),
            profiles,
        }
    }
}
