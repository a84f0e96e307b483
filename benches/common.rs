// Shared benchmark helpers
// Functions here are used across different benchmark files
#![allow(dead_code)]

use uploadgraph::model::{CommitId, CommitRecord, Tip, Upload, UploadState};
use uploadgraph::repository::Database;

pub fn commit(i: usize) -> CommitId {
    format!("{:040x}", i).parse().unwrap()
}

/// Generate a history of `num_commits` commits: a main line with a side
/// branch forked every 50 commits and merged back 10 commits later
pub fn generate_history(num_commits: usize) -> Vec<CommitRecord> {
    let mut records = Vec::with_capacity(num_commits);
    let mut main_tip: Option<usize> = None;
    let mut side: Option<(usize, usize)> = None; // (tip, forked_at)

    for i in 0..num_commits {
        let parents: Vec<CommitId> = match (main_tip, side) {
            (None, _) => vec![],
            (Some(m), Some((s, forked))) if i - forked >= 20 => {
                side = None;
                vec![commit(m), commit(s)]
            }
            (Some(_), Some((s, forked))) if i % 2 == 1 => {
                side = Some((i, forked));
                records.push(CommitRecord::new(commit(i), [commit(s)]));
                continue;
            }
            (Some(m), _) => {
                if side.is_none() && i % 50 == 0 {
                    side = Some((m, i));
                }
                vec![commit(m)]
            }
        };
        main_tip = Some(i);
        records.push(CommitRecord::new(commit(i), parents));
    }
    records
}

/// Place completed uploads every `every` commits, cycling through `slots` indexers
pub fn generate_uploads(records: &[CommitRecord], every: usize, slots: usize) -> Vec<Upload> {
    records
        .iter()
        .enumerate()
        .filter(|(i, _)| i % every == 0)
        .map(|(i, record)| Upload {
            id: i as i64 + 1,
            repository_id: 1,
            commit: record.commit,
            root: String::new(),
            indexer: format!("indexer-{}", i % slots),
            state: UploadState::Completed,
        })
        .collect()
}

pub fn generate_tips(records: &[CommitRecord]) -> Vec<Tip> {
    records
        .last()
        .map(|r| vec![Tip { commit: r.commit, is_default_branch: true }])
        .unwrap_or_default()
}

pub async fn setup_bench_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.init_schema().await.unwrap();
    db
}
