use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{CommitId, RepositoryId, Slot, UploadId, UploadMeta};

/// A commit and the hashes of its parents, as supplied by the graph source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit: CommitId,
    pub parents: Vec<CommitId>,
}

impl CommitRecord {
    pub fn new(commit: CommitId, parents: impl IntoIterator<Item = CommitId>) -> Self {
        Self { commit, parents: parents.into_iter().collect() }
    }
}

/// A commit referenced by a branch or tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tip {
    pub commit: CommitId,
    pub is_default_branch: bool,
}

/// Everything the commit graph source knows about one repository
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub commits: Vec<CommitRecord>,
    pub tips: Vec<Tip>,
}

/// One row of a nearest-uploads answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearestUpload {
    pub root: String,
    pub indexer: String,
    pub upload_id: UploadId,
    pub distance: u32,
}

/// Slot -> nearest upload mapping for a single commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NearestEntry(BTreeMap<Slot, UploadMeta>);

impl NearestEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: &Slot) -> Option<&UploadMeta> {
        self.0.get(slot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The same mapping with every distance increased by `by`, or `None` if
    /// a distance would overflow
    pub fn shifted(&self, by: u32) -> Option<Self> {
        self.0
            .iter()
            .map(|(slot, meta)| {
                let distance = meta.distance.checked_add(by)?;
                Some((slot.clone(), UploadMeta { upload_id: meta.upload_id, distance }))
            })
            .collect()
    }

    /// Rows ordered by slot (root, then indexer)
    pub fn to_rows(&self) -> Vec<NearestUpload> {
        self.0
            .iter()
            .map(|(slot, meta)| NearestUpload {
                root: slot.root.clone(),
                indexer: slot.indexer.clone(),
                upload_id: meta.upload_id,
                distance: meta.distance,
            })
            .collect()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = NearestUpload>) -> Self {
        rows.into_iter()
            .map(|row| {
                (Slot::new(row.root, row.indexer), UploadMeta { upload_id: row.upload_id, distance: row.distance })
            })
            .collect()
    }
}

impl FromIterator<(Slot, UploadMeta)> for NearestEntry {
    fn from_iter<I: IntoIterator<Item = (Slot, UploadMeta)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `commit` resolves to `ancestor`'s entry shifted by `distance`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub commit: CommitId,
    pub ancestor: CommitId,
    pub distance: u32,
}

/// An upload that is nearest for its slot at some tip of the given category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TipMark {
    pub repository_id: RepositoryId,
    pub upload_id: UploadId,
    pub is_default_branch: bool,
}

/// The durable result of one recomputation pass for a repository.
///
/// Ordered collections keep the projection identical across passes over an
/// unchanged snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub repository_id: RepositoryId,
    pub entries: BTreeMap<CommitId, NearestEntry>,
    pub links: BTreeMap<CommitId, Link>,
    pub tip_marks: BTreeSet<TipMark>,
}

impl Projection {
    pub fn empty(repository_id: RepositoryId) -> Self {
        Self { repository_id, ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.links.is_empty() && self.tip_marks.is_empty()
    }

    /// Uploads nearest at some default-branch tip
    pub fn visible_upload_ids(&self) -> Vec<UploadId> {
        let ids: BTreeSet<UploadId> = self
            .tip_marks
            .iter()
            .filter(|mark| mark.is_default_branch)
            .map(|mark| mark.upload_id)
            .collect();
        ids.into_iter().collect()
    }

    /// Uploads nearest at any tracked tip
    pub fn protected_upload_ids(&self) -> Vec<UploadId> {
        let ids: BTreeSet<UploadId> = self.tip_marks.iter().map(|mark| mark.upload_id).collect();
        ids.into_iter().collect()
    }
}
