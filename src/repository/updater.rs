//! Recompute-and-swap orchestration for one repository

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

use crate::graph::{self, GraphStats};
use crate::model::{GraphSnapshot, RepositoryId, Upload};

use super::database::RepositoryState;
use super::progress::{reporter, NoopProgress, ProgressReporter};
use super::store::IndexStore;
use super::SCHEMA_VERSION;

/// Outcome of one [`IndexUpdater::update`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub repository_id: RepositoryId,
    pub fingerprint: String,
    /// The stored projection already matched the snapshot
    pub skipped: bool,
    pub commits: usize,
    pub entries: usize,
    pub links: usize,
    pub tip_marks: usize,
    /// `None` when the pass was skipped
    pub stats: Option<GraphStats>,
    pub elapsed: Duration,
}

/// Recomputes the nearest-uploads projection of a repository from a full
/// snapshot and swaps it in atomically
pub struct IndexUpdater {
    verbose: bool,
    profile: bool,
}

impl Default for IndexUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexUpdater {
    pub fn new() -> Self {
        Self { verbose: true, profile: false }
    }

    /// Create a quiet updater (no progress bars, phase logs at debug level)
    pub fn quiet() -> Self {
        Self { verbose: false, profile: false }
    }

    /// Create a profiling updater (phase timings at info level)
    pub fn profiling() -> Self {
        Self { verbose: true, profile: true }
    }

    pub async fn update(
        &self,
        store: &impl IndexStore,
        repository_id: RepositoryId,
        snapshot: GraphSnapshot,
    ) -> Result<UpdateSummary> {
        let total_start = Instant::now();
        let progress: Box<dyn ProgressReporter> = if self.profile {
            Box::new(NoopProgress)
        } else {
            reporter(self.verbose)
        };

        // Phase 1: Load the upload catalog
        self.log(repository_id, "Loading uploads...");
        let phase_start = Instant::now();
        let uploads = store
            .load_uploads(repository_id)
            .await
            .with_context(|| format!("Failed to load uploads of repository {}", repository_id))?;
        self.profile_phase(&format!("Load uploads ({} rows)", uploads.len()), phase_start);

        // Phase 2: Check the stored fingerprint
        let fingerprint = fingerprint(&snapshot, &uploads);
        if store.get_fingerprint(repository_id).await.as_deref() == Some(fingerprint.as_str()) {
            self.log(
                repository_id,
                &format!("Index is up to date (fingerprint: {}), skipping", fingerprint),
            );
            return Ok(UpdateSummary {
                repository_id,
                fingerprint,
                skipped: true,
                commits: snapshot.commits.len(),
                entries: 0,
                links: 0,
                tip_marks: 0,
                stats: None,
                elapsed: total_start.elapsed(),
            });
        }

        // Phase 3: Compute the projection off the async executor
        self.log(
            repository_id,
            &format!("Computing nearest uploads for {} commits...", snapshot.commits.len()),
        );
        let phase_start = Instant::now();
        let computed = tokio::task::spawn_blocking(move || {
            graph::compute(repository_id, &snapshot.commits, &snapshot.tips, &uploads)
        })
        .await
        .context("Graph computation task failed")?
        .with_context(|| format!("Failed to compute projection of repository {}", repository_id))?;
        let projection = computed.projection;
        let stats = computed.stats;
        self.profile_phase(
            &format!(
                "Compute projection ({} entries, {} links, {} tip marks)",
                projection.entries.len(),
                projection.links.len(),
                projection.tip_marks.len()
            ),
            phase_start,
        );

        // Phase 4: Swap the projection in
        self.log(repository_id, "Writing projection...");
        let phase_start = Instant::now();
        let state = RepositoryState {
            repository_id,
            fingerprint: fingerprint.clone(),
            updated_at: OffsetDateTime::now_utc().unix_timestamp(),
            commits: stats.commits as i64,
            entries: projection.entries.len() as i64,
            links: projection.links.len() as i64,
            tip_marks: projection.tip_marks.len() as i64,
        };
        store
            .replace_projection(&projection, &state, progress.as_ref())
            .await
            .with_context(|| format!("Failed to store projection of repository {}", repository_id))?;
        self.profile_phase("Replace projection", phase_start);

        if self.profile {
            tracing::info!("[PROFILE] TOTAL update time: {:?}", total_start.elapsed());
        }

        Ok(UpdateSummary {
            repository_id,
            fingerprint,
            skipped: false,
            commits: stats.commits,
            entries: projection.entries.len(),
            links: projection.links.len(),
            tip_marks: projection.tip_marks.len(),
            stats: Some(stats),
            elapsed: total_start.elapsed(),
        })
    }

    fn log(&self, repository_id: RepositoryId, msg: &str) {
        if self.verbose {
            tracing::info!(repository_id, "{}", msg);
        } else {
            tracing::debug!(repository_id, "{}", msg);
        }
    }

    fn profile_phase(&self, name: &str, start: Instant) {
        if self.profile {
            tracing::info!("[PROFILE] {}: {:?}", name, start.elapsed());
        } else {
            tracing::debug!(elapsed = ?start.elapsed(), "{}", name);
        }
    }
}

/// Order-insensitive hash of everything a recomputation depends on.
///
/// Duplicate commit records keep the first occurrence, as the graph view
/// does. Only completed uploads take part; state changes of other uploads cannot
/// change the projection.
pub fn fingerprint(snapshot: &GraphSnapshot, uploads: &[Upload]) -> String {
    let mut seen = FxHashSet::default();
    let mut commits: Vec<_> = snapshot
        .commits
        .iter()
        .filter(|record| seen.insert(record.commit))
        .map(|record| {
            let mut parents = record.parents.clone();
            parents.sort_unstable();
            parents.dedup();
            (record.commit, parents)
        })
        .collect();
    commits.sort_unstable();

    let mut tips = snapshot.tips.clone();
    tips.sort_unstable_by_key(|tip| (tip.commit, tip.is_default_branch));
    tips.dedup();

    let mut completed: Vec<_> = uploads
        .iter()
        .filter(|upload| upload.is_completed())
        .map(|upload| (upload.id, upload.commit, upload.root.as_str(), upload.indexer.as_str()))
        .collect();
    completed.sort_unstable();

    let mut hasher = DefaultHasher::new();
    SCHEMA_VERSION.hash(&mut hasher);
    commits.hash(&mut hasher);
    tips.hash(&mut hasher);
    completed.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
