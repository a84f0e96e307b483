//! Storage, sources and orchestration around the graph core
//!
//! # Architecture
//!
//! - **database**: SQLite tables for the catalog and the projection
//! - **store**: persistence trait used by the updater and lookups
//! - **db_store**: Database implementation of IndexStore
//! - **catalog**: JSON upload catalog parsing
//! - **git_source**: commit graph snapshots read from a git repository
//! - **progress**: progress reporting abstraction
//! - **updater**: recompute-and-swap orchestrator
//! - **lookup**: read-only queries over a stored projection

mod catalog;
mod database;
mod db_store;
mod git_source;
mod lookup;
mod progress;
mod store;
mod updater;

pub use catalog::{load_catalog, parse_catalog};
pub use database::{Database, RepositoryState};
pub use git_source::GitGraphSource;
pub use lookup::LookupService;
pub use progress::{reporter, IndicatifProgress, NoopProgress, ProgressHandle, ProgressReporter};
pub use store::IndexStore;
pub use updater::{fingerprint, IndexUpdater, UpdateSummary};

// Re-export the schema version for callers who need it
pub const SCHEMA_VERSION: &str = "1";
