//! Database implementation of IndexStore

use anyhow::Result;

use crate::model::{CommitId, Link, NearestEntry, Projection, RepositoryId, Upload, UploadId};

use super::database::{Database, RepositoryState};
use super::progress::ProgressReporter;
use super::store::IndexStore;

impl IndexStore for Database {
    async fn load_uploads(&self, repository_id: RepositoryId) -> Result<Vec<Upload>> {
        Database::load_uploads(self, repository_id).await
    }

    async fn get_fingerprint(&self, repository_id: RepositoryId) -> Option<String> {
        self.load_repository_state(repository_id)
            .await
            .ok()
            .flatten()
            .map(|state| state.fingerprint)
    }

    async fn replace_projection(
        &self,
        projection: &Projection,
        state: &RepositoryState,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let total = projection.entries.len() + projection.links.len();
        let pb = progress.start("Writing projection", total as u64);
        let result = self
            .replace_projection_with_callback(projection, state, |n| pb.inc(n as u64))
            .await;
        pb.finish();
        result
    }

    async fn nearest_entry(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Option<NearestEntry>> {
        self.load_nearest_entry(repository_id, commit).await
    }

    async fn link(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Option<Link>> {
        self.load_link(repository_id, commit).await
    }

    async fn visible_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>> {
        self.load_tip_upload_ids(repository_id, true).await
    }

    async fn protected_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>> {
        self.load_tip_upload_ids(repository_id, false).await
    }
}
