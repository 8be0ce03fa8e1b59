//! Listing every known user.

use std::sync::Arc;

use futures::future::try_join_all;
use lectern_store::KeyValueStore;
use tracing::{debug, instrument, warn};

use crate::error::{CoreError, CoreResult};
use crate::keys;
use crate::users::{UserProfile, UserProfileAssembler};

/// Enumerates users by their info keys and assembles their profiles.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn KeyValueStore>,
    assembler: UserProfileAssembler,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>, assembler: UserProfileAssembler) -> Self {
        Self { store, assembler }
    }

    /// Profiles of every user, in store enumeration order.
    ///
    /// All profiles are assembled concurrently. If any one fails the whole
    /// call fails with [`CoreError::PartialAggregationFailure`] naming that
    /// user; no partial list is returned.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> CoreResult<Vec<UserProfile>> {
        let usernames = self.usernames().await?;

        let lookups = usernames.iter().map(|username| async move {
            self.assembler.get(username).await.map_err(|source| {
                CoreError::PartialAggregationFailure {
                    username: username.clone(),
                    source: Box::new(source),
                }
            })
        });
        let profiles = try_join_all(lookups).await?;

        debug!(users = profiles.len(), "user directory listed");
        Ok(profiles)
    }

    /// Number of info keys in the store, without assembling profiles.
    ///
    /// Sentinel keys are counted too: this is a raw key count.
    #[instrument(skip(self))]
    pub async fn count(&self) -> CoreResult<u64> {
        Ok(self.store.count(keys::USER_INFO_PATTERN).await?)
    }

    /// Usernames derived from info keys, minus sentinel garbage.
    async fn usernames(&self) -> CoreResult<Vec<String>> {
        let info_keys = self.store.keys(keys::USER_INFO_PATTERN).await?;
        let usernames = info_keys
            .iter()
            .filter_map(|key| {
                let username = keys::username_from_info_key(key);
                if username.is_none() {
                    warn!(key = %key, "info key does not name a user");
                }
                username
            })
            .filter(|username| {
                let garbage = keys::is_sentinel_username(username);
                if garbage {
                    warn!(username, "skipping sentinel username");
                }
                !garbage
            })
            .map(str::to_string)
            .collect();
        Ok(usernames)
    }
}
