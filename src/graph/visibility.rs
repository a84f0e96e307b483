//! Tip classification for upload retention.
//!
//! An upload is marked for a tip only when it is the nearest upload for its
//! slot at that tip commit. Default-branch marks make an upload visible;
//! marks of any category make it protected.

use std::collections::BTreeSet;

use crate::model::{RepositoryId, Tip, TipMark};

use super::resolver::NearestUploads;
use super::view::CommitGraphView;

pub fn classify(
    repository_id: RepositoryId,
    view: &CommitGraphView,
    nearest: &NearestUploads,
    tips: &[Tip],
) -> BTreeSet<TipMark> {
    let mut marks = BTreeSet::new();

    for tip in tips {
        let Some(pos) = view.position(&tip.commit) else {
            tracing::warn!(commit = %tip.commit.short(), default_branch = tip.is_default_branch, "tip commit not in graph, skipping");
            continue;
        };
        for (_, cand) in nearest.entry(pos) {
            marks.insert(TipMark {
                repository_id,
                upload_id: cand.upload_id,
                is_default_branch: tip.is_default_branch,
            });
        }
    }

    marks
}
