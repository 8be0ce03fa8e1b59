//! Per-user records and the views assembled from them.
//!
//! A user is never stored as one document. Three fragments live under
//! separate keys and are written independently:
//!
//! - `user:<name>:info`, a JSON record ([`UserInfo`])
//! - `user:<name>:video_slugs_watched`, a set of video slugs
//! - `user:<name>:login_count`, an integer counter
//!
//! [`UserProfile`] is the read-only view over all three.

pub mod directory;
pub mod profile;
pub mod session;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use lectern_store::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::timespan::{format_time_span, from_stored, to_stored};

pub use directory::UserDirectory;
pub use profile::UserProfileAssembler;
pub use session::SessionTracker;

// ═══════════════════════════════════════════════════════════════════════
//  Stored record
// ═══════════════════════════════════════════════════════════════════════

/// The stored `user:<name>:info` record.
///
/// Fields this crate does not know about are kept in `extra` so that a
/// read-modify-write never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_joined: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_last_login: Option<String>,
    #[serde(
        rename = "lastLoginIP",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bugzilla: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserInfo {
    /// Stamp a login at `now` from `ip`. The join date is only set when
    /// the record does not have one yet; an empty string counts as none.
    pub fn record_login(&mut self, now: DateTime<Utc>, ip: &str) {
        let stamp = to_stored(now);
        if self.date_joined.as_deref().is_none_or(str::is_empty) {
            self.date_joined = Some(stamp.clone());
        }
        self.date_last_login = Some(stamp);
        self.last_login_ip = Some(ip.to_string());
    }

    /// Overwrite the fields present in `update`, leaving the rest alone.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(display_name) = update.display_name {
            self.display_name = Some(display_name);
        }
        if let Some(website) = update.website {
            self.website = Some(website);
        }
        if let Some(bugzilla) = update.bugzilla {
            self.bugzilla = Some(bugzilla);
        }
    }
}

/// User-editable profile fields. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub website: Option<String>,
    pub bugzilla: Option<String>,
}

/// Read and decode an info record. A missing record reads as empty.
pub(crate) async fn read_info(store: &dyn KeyValueStore, key: &str) -> CoreResult<UserInfo> {
    match store.get(key).await? {
        None | Some(serde_json::Value::Null) => Ok(UserInfo::default()),
        Some(doc) => Ok(serde_json::from_value(doc)?),
    }
}

/// Encode and write an info record in full.
pub(crate) async fn write_info(
    store: &dyn KeyValueStore,
    key: &str,
    info: &UserInfo,
) -> CoreResult<()> {
    let doc = serde_json::to_value(info).map_err(CoreError::Json)?;
    store.set(key, &doc).await?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Assembled view
// ═══════════════════════════════════════════════════════════════════════

/// A timestamp together with how long ago it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub raw: DateTime<Utc>,
    pub relative: String,
}

impl Timestamp {
    fn parse(stored: Option<&str>, now: DateTime<Utc>) -> Option<Self> {
        let raw = from_stored(stored?)?;
        Some(Self {
            raw,
            relative: format_time_span(raw, now),
        })
    }
}

/// The info part of a profile, with dates resolved against one "now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    pub date_joined: Option<Timestamp>,
    pub date_last_login: Option<Timestamp>,
    #[serde(rename = "lastLoginIP")]
    pub last_login_ip: Option<String>,
    pub display_name: Option<String>,
    pub website: Option<String>,
    pub bugzilla: Option<String>,
}

impl ProfileInfo {
    fn resolve(info: UserInfo, now: DateTime<Utc>) -> Self {
        Self {
            date_joined: Timestamp::parse(info.date_joined.as_deref(), now),
            date_last_login: Timestamp::parse(info.date_last_login.as_deref(), now),
            last_login_ip: info.last_login_ip,
            display_name: info.display_name,
            website: info.website,
            bugzilla: info.bugzilla,
        }
    }
}

/// Everything known about one user, assembled from all three fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub login_count: u64,
    pub slugs_completed: BTreeSet<String>,
    pub info: ProfileInfo,
}

impl UserProfile {
    pub(crate) fn assemble(
        username: &str,
        info: UserInfo,
        slugs_completed: Vec<String>,
        login_count: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.to_string(),
            login_count,
            slugs_completed: slugs_completed.into_iter().collect(),
            info: ProfileInfo::resolve(info, now),
        }
    }
}

/// `"<displayName>; <bugzilla> (Bugzilla); <username>"`, each optional
/// part only when present and non-empty.
impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = non_empty(&self.info.display_name) {
            write!(f, "{name}; ")?;
        }
        if let Some(handle) = non_empty(&self.info.bugzilla) {
            write!(f, "{handle} (Bugzilla); ")?;
        }
        f.write_str(&self.username)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
