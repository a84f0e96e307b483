//! Read-only queries over a stored projection
//!
//! Nothing here walks the commit graph: a commit resolves to its own full
//! entry, or follows stored links until it reaches one.

use anyhow::Result;
use rustc_hash::FxHashSet;

use crate::graph::GraphError;
use crate::model::{CommitId, NearestEntry, NearestUpload, RepositoryId, UploadId};

use super::store::IndexStore;

pub struct LookupService<'a, S: IndexStore> {
    store: &'a S,
}

impl<'a, S: IndexStore> LookupService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Nearest upload per slot for `commit`.
    ///
    /// A commit with neither an entry nor a link has no visible uploads and
    /// yields an empty entry. Link chains of any length are followed with
    /// their distances summed.
    pub async fn nearest_entry(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<NearestEntry> {
        if let Some(entry) = self.store.nearest_entry(repository_id, commit).await? {
            return Ok(entry);
        }

        let mut current = *commit;
        let mut distance = 0u32;
        let mut seen = FxHashSet::default();
        seen.insert(current);

        loop {
            let Some(link) = self.store.link(repository_id, &current).await? else {
                if current == *commit {
                    return Ok(NearestEntry::new());
                }
                return Err(GraphError::DanglingLink { commit: *commit, ancestor: current }.into());
            };

            distance = distance
                .checked_add(link.distance)
                .ok_or(GraphError::DistanceOverflow { commit: *commit })?;
            current = link.ancestor;
            if !seen.insert(current) {
                return Err(GraphError::LinkCycle { start: *commit, commit: current }.into());
            }

            if let Some(entry) = self.store.nearest_entry(repository_id, &current).await? {
                if seen.len() > 2 {
                    tracing::debug!(commit = %commit.short(), hops = seen.len() - 1, "followed multi-hop link chain");
                }
                return entry
                    .shifted(distance)
                    .ok_or_else(|| GraphError::DistanceOverflow { commit: *commit }.into());
            }
        }
    }

    /// [`Self::nearest_entry`] as rows ordered by slot
    pub async fn nearest_uploads(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Vec<NearestUpload>> {
        Ok(self.nearest_entry(repository_id, commit).await?.to_rows())
    }

    pub async fn visible_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>> {
        self.store.visible_upload_ids(repository_id).await
    }

    pub async fn protected_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>> {
        self.store.protected_upload_ids(repository_id).await
    }

    pub async fn is_visible(&self, repository_id: RepositoryId, upload_id: UploadId) -> Result<bool> {
        Ok(self.visible_upload_ids(repository_id).await?.binary_search(&upload_id).is_ok())
    }

    /// Protected uploads must not be deleted by retention policies
    pub async fn is_protected(&self, repository_id: RepositoryId, upload_id: UploadId) -> Result<bool> {
        Ok(self.protected_upload_ids(repository_id).await?.binary_search(&upload_id).is_ok())
    }
}
