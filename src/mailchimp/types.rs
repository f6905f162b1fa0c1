//! Marketing API v3 response shapes (only the fields the relay reads).

use serde::Deserialize;

/// `GET /lists/{list_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListInfo {
    #[serde(default)]
    pub name: String,
    pub stats: ListStats,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListStats {
    pub member_count: u64,
}

/// `GET /lists/{list_id}/segments/{segment_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub name: String,
    pub member_count: u64,
}

/// Problem document returned with non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Problem {
    pub title: String,
    pub detail: String,
}
