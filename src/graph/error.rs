use thiserror::Error;

use crate::model::CommitId;

/// Failures of the in-memory graph computation and link resolution
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Topological ordering could not reach every commit. `commits` lists the
    /// commits on or behind the cycle, sorted.
    #[error("commit graph contains a cycle ({} commits unresolved, first {})", .commits.len(), first_of(.commits))]
    Cycle { commits: Vec<CommitId> },

    #[error("link chain starting at {start} revisits {commit}")]
    LinkCycle { start: CommitId, commit: CommitId },

    #[error("link from {commit} points at {ancestor}, which has no nearest-uploads entry")]
    DanglingLink { commit: CommitId, ancestor: CommitId },

    #[error("accumulated link distance from {commit} overflows")]
    DistanceOverflow { commit: CommitId },
}

fn first_of(commits: &[CommitId]) -> String {
    commits.first().map(|c| c.to_hex()).unwrap_or_else(|| "-".to_string())
}
