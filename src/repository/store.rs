//! Index store trait for persistence abstraction
//!
//! Decouples the updater and lookups from database implementation details.

use anyhow::Result;

use crate::model::{CommitId, Link, NearestEntry, Projection, RepositoryId, Upload, UploadId};

use super::database::RepositoryState;
use super::progress::ProgressReporter;

/// Persistence layer for the upload catalog and the nearest-uploads projection
///
/// This trait abstracts the storage operations needed by the updater and the
/// lookup service, so both can be tested without a real database.
#[allow(async_fn_in_trait)]
pub trait IndexStore {
    /// Catalog uploads of a repository, in any state
    async fn load_uploads(&self, repository_id: RepositoryId) -> Result<Vec<Upload>>;

    /// Fingerprint of the snapshot behind the stored projection, if any
    async fn get_fingerprint(&self, repository_id: RepositoryId) -> Option<String>;

    /// Replace the projection of `projection.repository_id` wholesale.
    ///
    /// Implementations must make the new rows visible all at once, or not at
    /// all when an error is returned.
    async fn replace_projection(
        &self,
        projection: &Projection,
        state: &RepositoryState,
        progress: &dyn ProgressReporter,
    ) -> Result<()>;

    async fn nearest_entry(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Option<NearestEntry>>;

    async fn link(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Option<Link>>;

    /// Uploads marked at a default-branch tip, ascending
    async fn visible_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>>;

    /// Uploads marked at any tip, ascending
    async fn protected_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>>;
}
