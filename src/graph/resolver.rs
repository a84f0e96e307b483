//! Nearest-upload resolution.
//!
//! Commits are visited in the view's topological order, so every parent is
//! resolved before its children. A commit's entry is built from its own
//! placements at distance zero plus each parent's entry shifted by one,
//! keeping the best candidate per slot.
//!
//! Candidates are ranked by `(distance, defining commit, upload id)`. Adding
//! one to every distance preserves that ranking, which is what lets a child
//! reuse its parents' results instead of re-walking history.

use crate::model::{CommitId, NearestEntry, UploadId, UploadMeta};

use super::interner::SlotId;
use super::view::{CommitGraphView, Position};

/// One upload competing for a slot at some commit
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub upload_id: UploadId,
    pub distance: u32,
    /// Commit that defines the upload
    pub origin: Position,
}

impl Candidate {
    fn rank(&self, view: &CommitGraphView) -> (u32, CommitId, UploadId) {
        (self.distance, view.commit(self.origin), self.upload_id)
    }

    fn beats(&self, other: &Candidate, view: &CommitGraphView) -> bool {
        self.rank(view) < other.rank(view)
    }
}

/// Per-commit candidates sorted by slot id
pub type SlotEntries = Vec<(SlotId, Candidate)>;

/// Resolved nearest uploads for every commit in a view, indexed by position
#[derive(Debug)]
pub struct NearestUploads {
    entries: Vec<SlotEntries>,
}

impl NearestUploads {
    pub fn entry(&self, pos: Position) -> &[(SlotId, Candidate)] {
        &self.entries[pos.0 as usize]
    }

    /// Materialise the entry for `pos` with slot names
    pub fn nearest_entry(&self, view: &CommitGraphView, pos: Position) -> NearestEntry {
        to_entry(view, self.entry(pos))
    }

    /// Whether `pos`'s entry equals `parent`'s with every distance plus one
    pub fn is_uniform_shift(&self, pos: Position, parent: Position) -> bool {
        let child = self.entry(pos);
        let parent = self.entry(parent);
        child.len() == parent.len()
            && child.iter().zip(parent).all(|((cs, cc), (ps, pc))| {
                cs == ps
                    && cc.upload_id == pc.upload_id
                    && cc.origin == pc.origin
                    && cc.distance == pc.distance + 1
            })
    }

    pub fn total_candidates(&self) -> usize {
        self.entries.iter().map(Vec::len).sum()
    }
}

pub fn resolve(view: &CommitGraphView) -> NearestUploads {
    let mut entries: Vec<SlotEntries> = vec![Vec::new(); view.len()];

    for &pos in view.topological() {
        let mut merged: SlotEntries = Vec::new();

        for placement in view.placements(pos) {
            let cand = Candidate { upload_id: placement.upload_id, distance: 0, origin: pos };
            offer(&mut merged, placement.slot, cand, view);
        }

        for &parent in view.parents(pos) {
            for &(slot, cand) in &entries[parent.0 as usize] {
                let shifted = Candidate { distance: cand.distance + 1, ..cand };
                offer(&mut merged, slot, shifted, view);
            }
        }

        entries[pos.0 as usize] = merged;
    }

    NearestUploads { entries }
}

/// Keep `cand` for `slot` if the slot is empty or `cand` outranks the holder
fn offer(entries: &mut SlotEntries, slot: SlotId, cand: Candidate, view: &CommitGraphView) {
    match entries.binary_search_by_key(&slot, |(s, _)| *s) {
        Ok(i) => {
            if cand.beats(&entries[i].1, view) {
                entries[i].1 = cand;
            }
        }
        Err(i) => entries.insert(i, (slot, cand)),
    }
}

/// Reference answer for a single commit by walking all of its ancestors.
///
/// Linear in the size of the commit's history; used to check [`resolve`],
/// never on the update path.
pub fn walk_nearest(view: &CommitGraphView, start: Position) -> NearestEntry {
    let mut best: SlotEntries = Vec::new();
    for (pos, distance) in view.ancestors(start) {
        for placement in view.placements(pos) {
            let cand = Candidate { upload_id: placement.upload_id, distance, origin: pos };
            offer(&mut best, placement.slot, cand, view);
        }
    }
    to_entry(view, &best)
}

fn to_entry(view: &CommitGraphView, entries: &[(SlotId, Candidate)]) -> NearestEntry {
    entries
        .iter()
        .map(|(slot, cand)| {
            (
                view.slots().get(*slot).clone(),
                UploadMeta { upload_id: cand.upload_id, distance: cand.distance },
            )
        })
        .collect()
}
