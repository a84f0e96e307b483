//! In-memory resolution of link chains.
//!
//! Links form a forest of "commit -> ancestor (+distance)" edges whose roots
//! own full entries. Resolution works like union-find: the chain is followed
//! to its root, then every commit on the path is re-pointed directly at the
//! root with its exact cumulative distance.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{CommitId, Link, NearestEntry, Projection};

use super::error::GraphError;

#[derive(Debug, Default, Clone)]
pub struct LinkResolver {
    links: FxHashMap<CommitId, (CommitId, u32)>,
}

impl LinkResolver {
    pub fn from_links<'a>(links: impl IntoIterator<Item = &'a Link>) -> Self {
        Self {
            links: links
                .into_iter()
                .map(|link| (link.commit, (link.ancestor, link.distance)))
                .collect(),
        }
    }

    /// Final ancestor and total distance for `commit`, or `None` when the
    /// commit has no link.
    pub fn resolve(&mut self, commit: CommitId) -> Result<Option<(CommitId, u32)>, GraphError> {
        let Some(&first) = self.links.get(&commit) else {
            return Ok(None);
        };

        let mut path = vec![(commit, first.1)];
        let mut seen = FxHashSet::default();
        seen.insert(commit);
        let mut current = first.0;

        while let Some(&(next, distance)) = self.links.get(&current) {
            if !seen.insert(current) {
                return Err(GraphError::LinkCycle { start: commit, commit: current });
            }
            path.push((current, distance));
            current = next;
        }

        let root = current;
        let mut total = 0u32;
        for &(node, distance) in path.iter().rev() {
            total = total
                .checked_add(distance)
                .ok_or(GraphError::DistanceOverflow { commit: node })?;
            self.links.insert(node, (root, total));
        }

        Ok(Some((root, total)))
    }

}

/// Lookups over a computed [`Projection`] without touching storage
pub struct ProjectionIndex<'a> {
    projection: &'a Projection,
    resolver: LinkResolver,
}

impl<'a> ProjectionIndex<'a> {
    pub fn new(projection: &'a Projection) -> Self {
        Self { projection, resolver: LinkResolver::from_links(projection.links.values()) }
    }

    pub fn nearest_uploads(&mut self, commit: CommitId) -> Result<NearestEntry, GraphError> {
        if let Some(entry) = self.projection.entries.get(&commit) {
            return Ok(entry.clone());
        }
        match self.resolver.resolve(commit)? {
            None => Ok(NearestEntry::new()),
            Some((ancestor, distance)) => self
                .projection
                .entries
                .get(&ancestor)
                .ok_or(GraphError::DanglingLink { commit, ancestor })?
                .shifted(distance)
                .ok_or(GraphError::DistanceOverflow { commit }),
        }
    }
}
