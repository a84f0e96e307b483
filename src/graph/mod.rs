//! Nearest-upload commit graph computation
//!
//! Turns a repository snapshot into the persisted projection used by lookups.
//!
//! # Architecture
//!
//! - **view**: dense commit table, parent edges, upload placements, topological order
//! - **interner**: slot interning for the per-commit maps
//! - **resolver**: nearest upload per slot for every commit
//! - **compress**: full entries at anchors, links everywhere else
//! - **visibility**: default-branch and protected tip marks
//! - **links**: union-find style resolution of link chains in memory
//!
//! Everything here is pure and synchronous; callers own scheduling and I/O.

mod compress;
mod error;
mod interner;
mod links;
mod resolver;
mod view;
mod visibility;

pub use compress::{compress, CompressedIndex};
pub use error::GraphError;
pub use interner::{SlotId, SlotInterner};
pub use links::{LinkResolver, ProjectionIndex};
pub use resolver::{resolve, walk_nearest, Candidate, NearestUploads};
pub use view::{Ancestors, CommitGraphView, GraphStats, Placement, Position};
pub use visibility::classify;

use crate::model::{CommitRecord, Projection, RepositoryId, Tip, Upload};

/// A computed projection together with statistics about the graph it came from
#[derive(Debug, Clone)]
pub struct Computed {
    pub projection: Projection,
    pub stats: GraphStats,
}

/// Computes the full projection for one repository.
///
/// Returns an error only when the commit graph contains a cycle; in that case
/// nothing is produced and any stored projection should be left as is.
pub fn compute(
    repository_id: RepositoryId,
    commits: &[CommitRecord],
    tips: &[Tip],
    uploads: &[Upload],
) -> Result<Computed, GraphError> {
    let span = tracing::debug_span!("compute", repository_id, commits = commits.len(), uploads = uploads.len());
    let _guard = span.enter();

    let view = CommitGraphView::build(commits, uploads)?;
    tracing::debug!(stats = ?view.stats(), "built commit graph view");

    let nearest = resolve(&view);
    tracing::debug!(candidates = nearest.total_candidates(), "resolved nearest uploads");

    let CompressedIndex { entries, links } = compress(&view, &nearest);
    let tip_marks = classify(repository_id, &view, &nearest, tips);
    tracing::debug!(entries = entries.len(), links = links.len(), tip_marks = tip_marks.len(), "compressed projection");

    Ok(Computed {
        projection: Projection { repository_id, entries, links, tip_marks },
        stats: view.stats().clone(),
    })
}

/// [`compute`] without the statistics
pub fn compute_projection(
    repository_id: RepositoryId,
    commits: &[CommitRecord],
    tips: &[Tip],
    uploads: &[Upload],
) -> Result<Projection, GraphError> {
    compute(repository_id, commits, tips, uploads).map(|computed| computed.projection)
}
