mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use uploadgraph::repository::{load_catalog, Database, GitGraphSource, IndexUpdater, LookupService};
use uploadgraph::util::{format_count, format_timestamp};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level)?;

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create index directory: {}", parent.display()))?;
    }
    tracing::debug!(path = %db_path.display(), "using index");

    let db_path_str = db_path.to_str().context("Invalid path encoding")?;
    let db = Database::new(db_path_str).await?;
    db.init_schema().await?;

    match cli.command {
        Command::Update { repository_id, repo_path } => {
            let source = GitGraphSource::new(repo_path);
            let snapshot = tokio::task::spawn_blocking(move || source.load())
                .await
                .context("Git reader task failed")??;

            let updater = if cli.profile {
                IndexUpdater::profiling()
            } else if cli.quiet {
                IndexUpdater::quiet()
            } else {
                IndexUpdater::new()
            };
            let summary = updater.update(&db, repository_id, snapshot).await?;

            if summary.skipped {
                println!("repository {}: up to date", repository_id);
            } else {
                println!(
                    "repository {}: {} commits, {} entries, {} links, {} tip marks ({:?})",
                    repository_id,
                    format_count(summary.commits as u64),
                    format_count(summary.entries as u64),
                    format_count(summary.links as u64),
                    format_count(summary.tip_marks as u64),
                    summary.elapsed
                );
            }
        }
        Command::ImportUploads { catalog } => {
            let uploads = load_catalog(&catalog)?;
            db.save_uploads(&uploads).await?;
            tracing::info!(uploads = uploads.len(), "imported catalog");
        }
        Command::Nearest { repository_id, commit, json } => {
            let lookup = LookupService::new(&db);
            let rows = lookup.nearest_uploads(repository_id, &commit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in rows {
                    println!("{}\t{}\t{}\t{}", row.root, row.indexer, row.upload_id, row.distance);
                }
            }
        }
        Command::Visible { repository_id, upload } => {
            let lookup = LookupService::new(&db);
            match upload {
                Some(upload_id) => println!("{}", lookup.is_visible(repository_id, upload_id).await?),
                None => {
                    for id in lookup.visible_upload_ids(repository_id).await? {
                        println!("{}", id);
                    }
                }
            }
        }
        Command::Protected { repository_id, upload } => {
            let lookup = LookupService::new(&db);
            match upload {
                Some(upload_id) => println!("{}", lookup.is_protected(repository_id, upload_id).await?),
                None => {
                    for id in lookup.protected_upload_ids(repository_id).await? {
                        println!("{}", id);
                    }
                }
            }
        }
        Command::DeleteRepository { repository_id } => {
            db.delete_repository(repository_id).await?;
            tracing::info!(repository_id, "deleted repository");
        }
        Command::Stats { repository_id } => {
            let uploads = db.load_uploads(repository_id).await?;
            let completed = uploads.iter().filter(|upload| upload.is_completed()).count();
            println!("repository:  {}", repository_id);
            println!(
                "uploads:     {} ({} completed)",
                format_count(uploads.len() as u64),
                format_count(completed as u64)
            );

            match db.load_repository_state(repository_id).await? {
                Some(state) => {
                    println!("commits:     {}", format_count(state.commits as u64));
                    println!("entries:     {}", format_count(state.entries as u64));
                    println!("links:       {}", format_count(state.links as u64));
                    println!("tip marks:   {}", format_count(state.tip_marks as u64));
                    println!("fingerprint: {}", state.fingerprint);
                    println!("updated:     {}", format_timestamp(state.updated_at));
                }
                None => println!("never updated"),
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` takes priority over `--log-level`
fn init_tracing(level: Level) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env()
        .context("Invalid RUST_LOG")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}

fn default_db_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .context("Could not determine cache directory")?
        .join("uploadgraph");
    Ok(cache_dir.join("index.db"))
}
