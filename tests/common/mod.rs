// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use git2::{Oid, Repository, Signature};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;
use uploadgraph::model::{
    CommitId, CommitRecord, GraphSnapshot, Link, NearestEntry, Projection, RepositoryId, Tip, Upload,
    UploadId, UploadState,
};
use uploadgraph::repository::{Database, IndexStore, ProgressReporter, RepositoryState};

/// Deterministic commit id for test graphs: `c(3)` is 000...003
pub fn c(i: u32) -> CommitId {
    format!("{:040}", i).parse().unwrap()
}

pub fn upload(id: UploadId, commit: CommitId, root: &str, indexer: &str) -> Upload {
    Upload {
        id,
        repository_id: 1,
        commit,
        root: root.to_string(),
        indexer: indexer.to_string(),
        state: UploadState::Completed,
    }
}

pub fn tip(commit: CommitId, is_default_branch: bool) -> Tip {
    Tip { commit, is_default_branch }
}

/// Linear history c(1) <- c(2) <- ... <- c(n)
pub fn chain(n: u32) -> Vec<CommitRecord> {
    (1..=n)
        .map(|i| {
            let parents = if i == 1 { vec![] } else { vec![c(i - 1)] };
            CommitRecord::new(c(i), parents)
        })
        .collect()
}

/// Create an in-memory test database
pub async fn create_test_db() -> Database {
    Database::new(":memory:").await.unwrap()
}

/// In-memory database with initialized schema
pub async fn setup_db() -> Database {
    let db = create_test_db().await;
    db.init_schema().await.unwrap();
    db
}

/// Create a temporary git repository
pub fn create_test_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().to_path_buf();
    let repo = Repository::init(&repo_path).unwrap();

    // Configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Create a commit with the given parents and move `refname` to it.
///
/// Each commit gets a tree holding one file named after the message, so
/// commits with identical parents still get distinct ids.
pub fn commit_on(repo: &Repository, refname: &str, parents: &[Oid], message: &str) -> Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();

    let blob = repo.blob(message.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(None).unwrap();
    builder.insert(format!("{}.txt", message.replace(' ', "_")), blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let parents: Vec<git2::Commit> = parents.iter().map(|oid| repo.find_commit(*oid).unwrap()).collect();
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

    repo.commit(Some(refname), &sig, &sig, message, &tree, &parent_refs).unwrap()
}

/// Commit on top of HEAD (or as a root commit on an unborn HEAD)
pub fn add_commit(repo: &Repository, message: &str) -> Oid {
    let parent = repo.head().ok().and_then(|h| h.target());
    let parents: Vec<Oid> = parent.into_iter().collect();
    commit_on(repo, "HEAD", &parents, message)
}

pub fn to_commit_id(oid: Oid) -> CommitId {
    CommitId::from_slice(oid.as_bytes()).unwrap()
}

/// IndexStore backed by plain maps, with switchable write failures
#[derive(Default)]
pub struct MemoryStore {
    pub uploads: Mutex<Vec<Upload>>,
    pub projections: Mutex<BTreeMap<RepositoryId, (Projection, RepositoryState)>>,
    pub fail_writes: Mutex<bool>,
    pub writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn with_uploads(uploads: Vec<Upload>) -> Self {
        Self { uploads: Mutex::new(uploads), ..Default::default() }
    }

    pub fn set_uploads(&self, uploads: Vec<Upload>) {
        *self.uploads.lock().unwrap() = uploads;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn projection(&self, repository_id: RepositoryId) -> Option<Projection> {
        self.projections.lock().unwrap().get(&repository_id).map(|(p, _)| p.clone())
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    /// Install a hand-written projection, bypassing the updater
    pub fn install(&self, projection: Projection) {
        let state = RepositoryState {
            repository_id: projection.repository_id,
            fingerprint: String::new(),
            updated_at: 0,
            commits: 0,
            entries: projection.entries.len() as i64,
            links: projection.links.len() as i64,
            tip_marks: projection.tip_marks.len() as i64,
        };
        self.projections.lock().unwrap().insert(projection.repository_id, (projection, state));
    }
}

impl IndexStore for MemoryStore {
    async fn load_uploads(&self, repository_id: RepositoryId) -> Result<Vec<Upload>> {
        Ok(self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.repository_id == repository_id)
            .cloned()
            .collect())
    }

    async fn get_fingerprint(&self, repository_id: RepositoryId) -> Option<String> {
        self.projections
            .lock()
            .unwrap()
            .get(&repository_id)
            .map(|(_, state)| state.fingerprint.clone())
    }

    async fn replace_projection(
        &self,
        projection: &Projection,
        state: &RepositoryState,
        _progress: &dyn ProgressReporter,
    ) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(anyhow!("disk full"));
        }
        *self.writes.lock().unwrap() += 1;
        self.projections
            .lock()
            .unwrap()
            .insert(projection.repository_id, (projection.clone(), state.clone()));
        Ok(())
    }

    async fn nearest_entry(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Option<NearestEntry>> {
        Ok(self
            .projections
            .lock()
            .unwrap()
            .get(&repository_id)
            .and_then(|(p, _)| p.entries.get(commit).cloned()))
    }

    async fn link(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Option<Link>> {
        Ok(self
            .projections
            .lock()
            .unwrap()
            .get(&repository_id)
            .and_then(|(p, _)| p.links.get(commit).copied()))
    }

    async fn visible_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>> {
        Ok(self.projection(repository_id).map(|p| p.visible_upload_ids()).unwrap_or_default())
    }

    async fn protected_upload_ids(&self, repository_id: RepositoryId) -> Result<Vec<UploadId>> {
        Ok(self.projection(repository_id).map(|p| p.protected_upload_ids()).unwrap_or_default())
    }
}

/// Snapshot helper for updater tests
pub fn snapshot(commits: Vec<CommitRecord>, tips: Vec<Tip>) -> GraphSnapshot {
    GraphSnapshot { commits, tips }
}
