//! Link compression of resolved nearest uploads.
//!
//! A full entry is kept only where an entry can change: roots, merges,
//! commits that define an upload, and any commit whose entry is not its
//! parent's shifted by one. Every other commit is linked straight to the
//! closest such ancestor ("anchor") with the accumulated distance, so chains
//! are already one hop long when written.
//!
//! Commits whose resolved entry is empty store neither an entry nor a link;
//! a lookup that finds nothing for a commit answers with the empty mapping.

use std::collections::BTreeMap;

use crate::model::{CommitId, Link, NearestEntry};

use super::resolver::NearestUploads;
use super::view::{CommitGraphView, Position};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompressedIndex {
    pub entries: BTreeMap<CommitId, NearestEntry>,
    pub links: BTreeMap<CommitId, Link>,
}

pub fn compress(view: &CommitGraphView, nearest: &NearestUploads) -> CompressedIndex {
    let mut index = CompressedIndex::default();
    // anchor[pos] = (closest full-entry commit at or above pos, distance to it)
    let mut anchors: Vec<(Position, u32)> = vec![(Position(0), 0); view.len()];

    for &pos in view.topological() {
        let parents = view.parents(pos);
        let full = match parents {
            [parent] => {
                !view.placements(pos).is_empty() || !nearest.is_uniform_shift(pos, *parent)
            }
            _ => true,
        };

        if full {
            anchors[pos.0 as usize] = (pos, 0);
            if !nearest.entry(pos).is_empty() {
                index.entries.insert(view.commit(pos), nearest.nearest_entry(view, pos));
            }
            continue;
        }

        let (anchor, distance) = anchors[parents[0].0 as usize];
        let anchored = (anchor, distance + 1);
        anchors[pos.0 as usize] = anchored;

        if !nearest.entry(anchor).is_empty() {
            let commit = view.commit(pos);
            index.links.insert(
                commit,
                Link { commit, ancestor: view.commit(anchor), distance: anchored.1 },
            );
        }
    }

    index
}
