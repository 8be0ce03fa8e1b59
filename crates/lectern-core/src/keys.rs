//! Key naming for everything this crate reads or writes.
//!
//! These names are shared with other writers of the same store and must
//! not change.

use lectern_store::escape_glob;

/// Prefix under which each category document is stored (`category:<n>`).
pub const CATEGORY_PREFIX: &str = "category";

/// Pattern matching every stored video.
pub const VIDEO_PATTERN: &str = "video:*";

/// Opaque lesson statistics blob.
pub const VIDEO_STATS_KEY: &str = "stats:video";

/// Pattern matching every user's info record.
pub const USER_INFO_PATTERN: &str = "user:*:info";

const USER_PREFIX: &str = "user:";
const INFO_SUFFIX: &str = ":info";

/// Derived usernames that mark malformed persisted keys rather than users.
const SENTINEL_USERNAMES: &[&str] = &["null", "undefined"];

pub fn video(slug: &str) -> String {
    format!("video:{slug}")
}

pub fn category(index: usize) -> String {
    format!("{CATEGORY_PREFIX}:{index}")
}

pub fn user_info(username: &str) -> String {
    format!("{USER_PREFIX}{username}{INFO_SUFFIX}")
}

pub fn user_watched(username: &str) -> String {
    format!("{USER_PREFIX}{username}:video_slugs_watched")
}

pub fn user_login_count(username: &str) -> String {
    format!("{USER_PREFIX}{username}:login_count")
}

/// Pattern matching every key that belongs to `username`.
pub fn user_all(username: &str) -> String {
    format!("{USER_PREFIX}{}:*", escape_glob(username))
}

/// Recover the username from a `user:<name>:info` key.
pub fn username_from_info_key(key: &str) -> Option<&str> {
    key.strip_prefix(USER_PREFIX)?.strip_suffix(INFO_SUFFIX)
}

/// Whether a derived username is garbage left by a malformed write.
///
/// The empty name is included: `user::info` can only come from a write
/// with a missing username.
pub fn is_sentinel_username(username: &str) -> bool {
    username.is_empty() || SENTINEL_USERNAMES.contains(&username)
}
