use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use uploadgraph::model::{CommitId, RepositoryId, UploadId};

#[derive(Parser, Debug)]
#[command(name = "uploadgraph", version, about = "Nearest-upload commit graph index")]
pub struct Cli {
    /// SQLite index location (defaults to <cache dir>/uploadgraph/index.db)
    #[arg(long, global = true, env = "UPLOADGRAPH_DB")]
    pub db: Option<PathBuf>,

    /// A global log level to use when printing logs.
    /// `RUST_LOG` always has priority.
    #[arg(long, global = true, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// No progress bars, phase logs only at debug level
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Log timing of every update phase
    #[arg(long, global = true)]
    pub profile: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recompute the projection of a repository from its git history
    Update {
        repository_id: RepositoryId,
        /// Path to the git repository
        #[arg(default_value = ".")]
        repo_path: PathBuf,
    },
    /// Insert or update catalog rows from a JSON array of uploads
    ImportUploads {
        catalog: PathBuf,
    },
    /// Nearest upload per (root, indexer) for a commit
    Nearest {
        repository_id: RepositoryId,
        commit: CommitId,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Uploads nearest at a default-branch tip
    Visible {
        repository_id: RepositoryId,
        /// Only report whether this upload is visible
        #[arg(long)]
        upload: Option<UploadId>,
    },
    /// Uploads nearest at any branch or tag tip
    Protected {
        repository_id: RepositoryId,
        /// Only report whether this upload is protected
        #[arg(long)]
        upload: Option<UploadId>,
    },
    /// Remove catalog rows, projection and state of a repository
    DeleteRepository {
        repository_id: RepositoryId,
    },
    /// Summary of the last update of a repository
    Stats {
        repository_id: RepositoryId,
    },
}
