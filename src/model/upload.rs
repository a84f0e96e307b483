use serde::{Deserialize, Serialize};
use std::fmt;

use super::CommitId;

pub type UploadId = i64;
pub type RepositoryId = i64;

/// Lifecycle state of an upload in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Queued,
    Processing,
    Completed,
    Errored,
    Deleted,
}

impl UploadState {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadState::Queued => "queued",
            UploadState::Processing => "processing",
            UploadState::Completed => "completed",
            UploadState::Errored => "errored",
            UploadState::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(UploadState::Queued),
            "processing" => Some(UploadState::Processing),
            "completed" => Some(UploadState::Completed),
            "errored" => Some(UploadState::Errored),
            "deleted" => Some(UploadState::Deleted),
            _ => None,
        }
    }
}

/// A (root, indexer) coverage unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub root: String,
    pub indexer: String,
}

impl Slot {
    pub fn new(root: impl Into<String>, indexer: impl Into<String>) -> Self {
        Self { root: root.into(), indexer: indexer.into() }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root, self.indexer)
    }
}

/// An upload as recorded in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub repository_id: RepositoryId,
    pub commit: CommitId,
    #[serde(default)]
    pub root: String,
    pub indexer: String,
    pub state: UploadState,
}

impl Upload {
    pub fn is_completed(&self) -> bool {
        self.state == UploadState::Completed
    }
}

/// An upload reference paired with its distance from the queried commit
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UploadMeta {
    pub upload_id: UploadId,
    pub distance: u32,
}
