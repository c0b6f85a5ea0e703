use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Metadata of one uploaded file, keyed in the store by `storage_name`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub storage_name: String,
    pub original_name: String,
    pub storage_path: PathBuf,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: Option<u32>,
    pub download_count: u32,
}

pub type Records = BTreeMap<String, FileRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Active,
    Expired,
    LimitReached,
}

impl LinkStatus {
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Active => "Active",
            LinkStatus::Expired => "Expired",
            LinkStatus::LimitReached => "Limit reached",
        }
    }

    /// Message shown to someone following a link that is no longer served.
    pub fn reason(self) -> &'static str {
        match self {
            LinkStatus::Active => "This link is active.",
            LinkStatus::Expired => "This link has expired.",
            LinkStatus::LimitReached => "The download limit for this link has been reached.",
        }
    }
}

/// Expiry wins over the download limit when both apply.
pub fn link_status(now: DateTime<Utc>, record: &FileRecord) -> LinkStatus {
    if record.expires_at.is_some_and(|at| now > at) {
        LinkStatus::Expired
    } else if record
        .max_downloads
        .is_some_and(|max| record.download_count >= max)
    {
        LinkStatus::LimitReached
    } else {
        LinkStatus::Active
    }
}
