//! JSON upload catalog
//!
//! A catalog is a JSON array of upload records:
//!
//! ```json
//! [{"id": 1, "repository_id": 7, "commit": "<40 hex>", "root": "", "indexer": "scip-go", "state": "completed"}]
//! ```

use anyhow::{bail, Context, Result};
use rustc_hash::FxHashSet;
use std::fs;
use std::path::Path;

use crate::model::Upload;

/// Parse a catalog, rejecting duplicate upload ids
pub fn parse_catalog(json: &str) -> Result<Vec<Upload>> {
    let uploads: Vec<Upload> = serde_json::from_str(json).context("Invalid upload catalog")?;

    let mut seen = FxHashSet::default();
    for upload in &uploads {
        if !seen.insert(upload.id) {
            bail!("Duplicate upload id {} in catalog", upload.id);
        }
    }

    Ok(uploads)
}

pub fn load_catalog(path: &Path) -> Result<Vec<Upload>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read catalog: {}", path.display()))?;
    parse_catalog(&text).with_context(|| format!("Could not load catalog: {}", path.display()))
}
