//! In-memory commit graph for one repository.
//!
//! Commits are assigned dense positions in input order. Parent edges are
//! stored as a flat array indexed by per-commit offsets, and the
//! ancestor-first topological order is computed once at construction.
//!
//! # Invariants
//! - Every stored parent edge points at a commit present in the view; edges
//!   to unknown parents are dropped and counted.
//! - `order` contains every position exactly once, parents before children.
//! - Placements only reference completed uploads defined at a known commit.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::model::{CommitId, CommitRecord, Upload, UploadId};

use super::error::GraphError;
use super::interner::{SlotId, SlotInterner};

/// Dense index of a commit inside a [`CommitGraphView`]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Position(pub u32);

impl Position {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// An upload registered at its defining commit
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Placement {
    pub slot: SlotId,
    pub upload_id: UploadId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub commits: usize,
    pub edges: usize,
    pub missing_parents: usize,
    pub roots: usize,
    pub merges: usize,
    pub uploads: usize,
    pub skipped_uploads: usize,
    pub slots: usize,
}

#[derive(Debug)]
pub struct CommitGraphView {
    commits: Vec<CommitId>,
    positions: FxHashMap<CommitId, Position>,
    parent_offsets: Vec<usize>,
    parents: Vec<Position>,
    placements: FxHashMap<Position, Vec<Placement>>,
    slots: SlotInterner,
    order: Vec<Position>,
    stats: GraphStats,
}

impl CommitGraphView {
    /// Builds the view and its topological order.
    ///
    /// Fails only when the parent edges form a cycle.
    pub fn build(records: &[CommitRecord], uploads: &[Upload]) -> Result<Self, GraphError> {
        let mut commits = Vec::with_capacity(records.len());
        let mut positions: FxHashMap<CommitId, Position> = FxHashMap::default();
        let mut kept: Vec<&CommitRecord> = Vec::with_capacity(records.len());

        for record in records {
            if positions.contains_key(&record.commit) {
                continue;
            }
            positions.insert(record.commit, Position(commits.len() as u32));
            commits.push(record.commit);
            kept.push(record);
        }

        let mut stats = GraphStats { commits: commits.len(), ..Default::default() };
        let mut parent_offsets = Vec::with_capacity(commits.len() + 1);
        let mut parents = Vec::new();
        parent_offsets.push(0);

        for record in &kept {
            let start = parents.len();
            for parent in &record.parents {
                match positions.get(parent) {
                    Some(&pos) if !parents[start..].contains(&pos) => parents.push(pos),
                    Some(_) => {}
                    None => {
                        tracing::debug!(commit = %record.commit.short(), parent = %parent.short(), "parent outside of graph, treating as boundary");
                        stats.missing_parents += 1;
                    }
                }
            }
            match parents.len() - start {
                0 => stats.roots += 1,
                1 => {}
                _ => stats.merges += 1,
            }
            parent_offsets.push(parents.len());
        }
        stats.edges = parents.len();

        let mut slots = SlotInterner::new();
        let mut placements: FxHashMap<Position, Vec<Placement>> = FxHashMap::default();
        for upload in uploads {
            if !upload.is_completed() {
                stats.skipped_uploads += 1;
                continue;
            }
            let Some(&pos) = positions.get(&upload.commit) else {
                tracing::debug!(upload_id = upload.id, commit = %upload.commit.short(), "upload commit not in graph, skipping");
                stats.skipped_uploads += 1;
                continue;
            };
            let slot = slots.intern(&upload.root, &upload.indexer);
            placements.entry(pos).or_default().push(Placement { slot, upload_id: upload.id });
            stats.uploads += 1;
        }
        stats.slots = slots.len();

        let mut view = Self {
            commits,
            positions,
            parent_offsets,
            parents,
            placements,
            slots,
            order: Vec::new(),
            stats,
        };
        view.order = view.topological_order()?;
        Ok(view)
    }

    /// Kahn ordering over parent edges, ancestors first.
    ///
    /// Commits left unvisited once the queue drains sit on or behind a cycle.
    fn topological_order(&self) -> Result<Vec<Position>, GraphError> {
        let n = self.commits.len();
        let mut in_degree = vec![0u32; n];
        let mut out_degree = vec![0usize; n];

        for idx in 0..n {
            let pos = Position(idx as u32);
            in_degree[idx] = self.parents(pos).len() as u32;
            for parent in self.parents(pos) {
                out_degree[parent.idx()] += 1;
            }
        }

        let mut child_offsets = vec![0usize; n + 1];
        for i in 0..n {
            child_offsets[i + 1] = child_offsets[i] + out_degree[i];
        }
        let mut children = vec![Position(0); child_offsets[n]];
        let mut cursor = child_offsets.clone();
        for idx in 0..n {
            let pos = Position(idx as u32);
            for parent in self.parents(pos) {
                children[cursor[parent.idx()]] = pos;
                cursor[parent.idx()] += 1;
            }
        }

        let mut queue: VecDeque<Position> =
            (0..n).filter(|&i| in_degree[i] == 0).map(|i| Position(i as u32)).collect();
        let mut visited = vec![false; n];
        let mut ordered = Vec::with_capacity(n);

        while let Some(pos) = queue.pop_front() {
            visited[pos.idx()] = true;
            ordered.push(pos);
            for child in &children[child_offsets[pos.idx()]..child_offsets[pos.idx() + 1]] {
                let deg = &mut in_degree[child.idx()];
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(*child);
                }
            }
        }

        if ordered.len() != n {
            let mut commits: Vec<CommitId> = (0..n)
                .filter(|&i| !visited[i])
                .map(|i| self.commits[i])
                .collect();
            commits.sort();
            return Err(GraphError::Cycle { commits });
        }

        Ok(ordered)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn position(&self, commit: &CommitId) -> Option<Position> {
        self.positions.get(commit).copied()
    }

    #[inline]
    pub fn commit(&self, pos: Position) -> CommitId {
        self.commits[pos.idx()]
    }

    /// In-graph parents of `pos`, deduplicated, in input order
    #[inline]
    pub fn parents(&self, pos: Position) -> &[Position] {
        &self.parents[self.parent_offsets[pos.idx()]..self.parent_offsets[pos.idx() + 1]]
    }

    pub fn placements(&self, pos: Position) -> &[Placement] {
        self.placements.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn slots(&self) -> &SlotInterner {
        &self.slots
    }

    /// Every position, parents before children
    pub fn topological(&self) -> &[Position] {
        &self.order
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Breadth-first walk over `start` and its ancestors, yielding each
    /// commit once together with its minimal edge distance from `start`.
    pub fn ancestors(&self, start: Position) -> Ancestors<'_> {
        let mut queue = VecDeque::new();
        queue.push_back((start, 0));
        let mut seen = FxHashSet::default();
        seen.insert(start);
        Ancestors { view: self, queue, seen }
    }
}

pub struct Ancestors<'a> {
    view: &'a CommitGraphView,
    queue: VecDeque<(Position, u32)>,
    seen: FxHashSet<Position>,
}

impl Iterator for Ancestors<'_> {
    type Item = (Position, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let (pos, distance) = self.queue.pop_front()?;
        for &parent in self.view.parents(pos) {
            if self.seen.insert(parent) {
                self.queue.push_back((parent, distance + 1));
            }
        }
        Some((pos, distance))
    }
}
