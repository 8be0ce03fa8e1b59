//! Fan-in of the three user fragments into a [`UserProfile`].

use std::sync::Arc;

use lectern_store::{KeyValueStore, StoreError};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::keys;
use crate::users::{ProfileUpdate, UserInfo, UserProfile, read_info, write_info};

/// Builds profiles from the store. Cheap to clone.
#[derive(Clone)]
pub struct UserProfileAssembler {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl UserProfileAssembler {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Assemble the profile of `username`.
    ///
    /// The info record, watched set and login counter are fetched
    /// concurrently. The profile exists only if all three lookups succeed;
    /// the first failure is returned as [`CoreError::LookupFailed`] and
    /// the other lookups are dropped.
    ///
    /// Absent fragments are not failures: they read as an empty record, an
    /// empty set and zero logins.
    #[instrument(skip(self))]
    pub async fn get(&self, username: &str) -> CoreResult<UserProfile> {
        let (info, watched, login_count) = futures::try_join!(
            self.fetch_info(username),
            self.fetch_watched(username),
            self.fetch_login_count(username),
        )?;

        let now = self.clock.now();
        debug!(username, login_count, watched = watched.len(), "profile assembled");
        Ok(UserProfile::assemble(
            username,
            info,
            watched,
            login_count,
            now,
        ))
    }

    /// Overwrite the supplied profile fields and return the fresh profile.
    ///
    /// Nothing is written if reading the current record fails.
    #[instrument(skip(self))]
    pub async fn update_info(
        &self,
        username: &str,
        update: ProfileUpdate,
    ) -> CoreResult<UserProfile> {
        let key = keys::user_info(username);
        let mut info = read_info(self.store.as_ref(), &key).await?;
        info.apply(update);
        write_info(self.store.as_ref(), &key, &info).await?;
        self.get(username).await
    }

    /// Remove every key belonging to `username`. Returns how many went.
    #[instrument(skip(self))]
    pub async fn delete(&self, username: &str) -> CoreResult<u64> {
        let removed = self.store.delete_matching(&keys::user_all(username)).await?;
        debug!(username, removed, "user deleted");
        Ok(removed)
    }

    async fn fetch_info(&self, username: &str) -> CoreResult<UserInfo> {
        let key = keys::user_info(username);
        match self.store.get(&key).await {
            Ok(None | Some(Value::Null)) => Ok(UserInfo::default()),
            Ok(Some(doc)) => serde_json::from_value(doc).map_err(|e| CoreError::LookupFailed {
                key,
                source: StoreError::Json(e),
            }),
            Err(source) => Err(CoreError::LookupFailed { key, source }),
        }
    }

    async fn fetch_watched(&self, username: &str) -> CoreResult<Vec<String>> {
        let key = keys::user_watched(username);
        self.store
            .set_members(&key)
            .await
            .map_err(|source| CoreError::LookupFailed { key, source })
    }

    async fn fetch_login_count(&self, username: &str) -> CoreResult<u64> {
        let key = keys::user_login_count(username);
        let stored = match self.store.get(&key).await {
            Ok(stored) => stored,
            Err(source) => return Err(CoreError::LookupFailed { key, source }),
        };
        parse_login_count(stored.as_ref()).ok_or_else(|| CoreError::LookupFailed {
            source: StoreError::WrongType {
                key: key.clone(),
                expected: "integer",
            },
            key,
        })
    }
}

/// Counters may be stored as numbers or numeric strings. Negative values
/// are treated as zero.
fn parse_login_count(stored: Option<&Value>) -> Option<u64> {
    match stored {
        None | Some(Value::Null) => Some(0),
        Some(Value::Number(n)) => n.as_i64().map(|n| n.max(0) as u64),
        Some(Value::String(s)) => s.parse::<i64>().ok().map(|n| n.max(0) as u64),
        Some(_) => None,
    }
}
