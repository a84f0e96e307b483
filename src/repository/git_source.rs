//! Commit graph snapshots read from a local git repository

use anyhow::{anyhow, Context, Result};
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::time::Instant;

use crate::model::{CommitId, CommitRecord, GraphSnapshot, Tip};

/// Reads every commit reachable from local branches and tags.
///
/// The branch `HEAD` points at is the default branch; every other branch and
/// every tag is an "other" tip. Commits listed in a shallow clone's boundary
/// are reported without parents.
pub struct GitGraphSource {
    repo_path: PathBuf,
}

impl GitGraphSource {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into() }
    }

    pub fn load(&self) -> Result<GraphSnapshot> {
        let start = Instant::now();
        let repo = gix::open(&self.repo_path)
            .with_context(|| format!("Failed to open git repository: {}", self.repo_path.display()))?;

        let head_name = repo.head_name().context("Failed to resolve HEAD")?;
        if head_name.is_none() {
            tracing::warn!("HEAD is detached, no default branch tips");
        }

        let mut tips = Vec::new();
        let references = repo.references().context("Failed to read references")?;
        let branches = references.local_branches().map_err(|e| anyhow!("Failed to list branches: {}", e))?;
        let tags = references.tags().map_err(|e| anyhow!("Failed to list tags: {}", e))?;

        for reference in branches.chain(tags) {
            let mut reference = reference.map_err(|e| anyhow!("Failed to read reference: {}", e))?;
            let is_default_branch = head_name
                .as_ref()
                .is_some_and(|head| head.as_bstr() == reference.name().as_bstr());

            let id = reference
                .peel_to_id_in_place()
                .with_context(|| format!("Failed to peel {}", reference.name().as_bstr()))?;
            let object = id.object().context("Failed to read reference target")?;
            if object.kind != gix::object::Kind::Commit {
                tracing::debug!(reference = %reference.name().as_bstr(), kind = ?object.kind, "skipping non-commit reference");
                continue;
            }

            tips.push((id.detach(), is_default_branch));
        }

        if tips.is_empty() {
            tracing::info!(path = %self.repo_path.display(), "repository has no branches or tags");
            return Ok(GraphSnapshot::default());
        }

        // Shallow boundaries are grafted roots: their parents are not in the object database
        let shallow: FxHashSet<gix::ObjectId> = repo
            .shallow_commits()
            .context("Failed to read shallow commits")?
            .map(|commits| commits.iter().copied().collect())
            .unwrap_or_default();

        let mut commits = Vec::new();
        let walk = repo.rev_walk(tips.iter().map(|(id, _)| *id));
        for info in walk.all()? {
            let info = info?;
            let parents = if shallow.contains(&info.id) {
                tracing::debug!(commit = %info.id, "shallow boundary, dropping parents");
                Vec::new()
            } else {
                info.parent_ids()
                    .map(|id| to_commit_id(id.detach()))
                    .collect::<Result<Vec<_>>>()?
            };
            commits.push(CommitRecord { commit: to_commit_id(info.id)?, parents });
        }

        let known: FxHashSet<CommitId> = commits.iter().map(|record| record.commit).collect();
        let tips = tips
            .into_iter()
            .map(|(id, is_default_branch)| Ok(Tip { commit: to_commit_id(id)?, is_default_branch }))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|tip| known.contains(&tip.commit))
            .collect::<Vec<_>>();

        tracing::debug!(
            commits = commits.len(),
            tips = tips.len(),
            elapsed = ?start.elapsed(),
            "loaded commit graph"
        );

        Ok(GraphSnapshot { commits, tips })
    }
}

fn to_commit_id(id: gix::ObjectId) -> Result<CommitId> {
    CommitId::from_slice(id.as_bytes()).with_context(|| format!("Unsupported object id: {}", id))
}
