//! Login bookkeeping and lesson completion.

use std::sync::Arc;

use lectern_store::KeyValueStore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::catalog::Video;
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::keys;
use crate::users::{read_info, write_info};

/// Records logins and completed lessons. Cheap to clone.
#[derive(Clone)]
pub struct SessionTracker {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Count a login by `username` from `ip` and return the new count.
    ///
    /// Two steps, not one transaction:
    /// 1. the login counter is incremented atomically;
    /// 2. the info record is read, stamped with the login and written
    ///    back whole.
    ///
    /// If step 1 fails the record is untouched. If step 2 fails the
    /// increment stays applied. Concurrent logins of the same user race on
    /// step 2 and the last writer wins.
    #[instrument(skip(self))]
    pub async fn report_login(&self, username: &str, ip: &str) -> CoreResult<u64> {
        let login_count = self
            .store
            .increment(&keys::user_login_count(username))
            .await?;

        let info_key = keys::user_info(username);
        let mut info = read_info(self.store.as_ref(), &info_key).await?;
        let first_login = info.date_joined.is_none();
        info.record_login(self.clock.now(), ip);
        write_info(self.store.as_ref(), &info_key, &info).await?;

        if first_login {
            info!(username, "first login recorded");
        }
        debug!(username, login_count, "login recorded");
        Ok(login_count.max(0) as u64)
    }

    /// Mark the video `slug` as watched by `username`.
    ///
    /// Fails with [`CoreError::UnknownVideo`] if no such video is stored,
    /// in which case nothing is added. Returns whether the slug was new
    /// to the user's watched set.
    #[instrument(skip(self))]
    pub async fn report_completed(&self, slug: &str, username: &str) -> CoreResult<bool> {
        let video: Video = match self.store.get(&keys::video(slug)).await? {
            Some(doc) => serde_json::from_value(doc)?,
            None => {
                return Err(CoreError::UnknownVideo {
                    slug: slug.to_string(),
                });
            }
        };

        let added = self
            .store
            .add_to_set(&keys::user_watched(username), &video.slug)
            .await?;
        debug!(username, slug = %video.slug, added, "completion recorded");
        Ok(added)
    }

    /// Fire-and-forget form of [`SessionTracker::report_completed`].
    ///
    /// Runs on the tokio runtime; failures are logged, not returned. The
    /// handle may be dropped.
    pub fn spawn_report_completed(&self, slug: String, username: String) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            if let Err(err) = tracker.report_completed(&slug, &username).await {
                warn!(%slug, %username, %err, "completion not recorded");
            }
        })
    }
}
