use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite, Transaction,
};
use std::str::FromStr;

use crate::model::{
    CommitId, Link, NearestEntry, NearestUpload, Projection, RepositoryId, TipMark, Upload,
    UploadId, UploadState,
};

use super::SCHEMA_VERSION;

const BATCH_SIZE: usize = 5000;

/// Bookkeeping for the last successful recomputation of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    pub repository_id: RepositoryId,
    pub fingerprint: String,
    pub updated_at: i64,
    pub commits: i64,
    pub entries: i64,
    pub links: i64,
    pub tip_marks: i64,
}

/// Database abstraction for SQLite operations
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "-64000"); // 64MB cache

        // A single long-lived connection: in-memory databases live and die with it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Initialize database schema, returns true if schema was rebuilt
    pub async fn init_schema(&self) -> Result<bool> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;

        let stored_version: Option<String> = sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get("value"));

        let needs_rebuild = stored_version.as_deref() != Some(SCHEMA_VERSION);

        if needs_rebuild {
            if let Some(old) = &stored_version {
                tracing::warn!(from = %old, to = SCHEMA_VERSION, "schema version changed, rebuilding index");
            }
            for table in [
                "uploads",
                "nearest_uploads",
                "nearest_uploads_links",
                "uploads_visible_at_tip",
                "repository_state",
            ] {
                sqlx::query(&format!("DROP TABLE IF EXISTS {table}")).execute(&self.pool).await?;
            }
            sqlx::query("DELETE FROM metadata").execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS uploads (
                id INTEGER PRIMARY KEY,
                repository_id INTEGER NOT NULL,
                commit_oid BLOB NOT NULL,
                root TEXT NOT NULL,
                indexer TEXT NOT NULL,
                state TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS uploads_repository_id ON uploads (repository_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS nearest_uploads (
                repository_id INTEGER NOT NULL,
                commit_oid BLOB NOT NULL,
                uploads TEXT NOT NULL,
                PRIMARY KEY (repository_id, commit_oid)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS nearest_uploads_links (
                repository_id INTEGER NOT NULL,
                commit_oid BLOB NOT NULL,
                ancestor_oid BLOB NOT NULL,
                distance INTEGER NOT NULL,
                PRIMARY KEY (repository_id, commit_oid)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS uploads_visible_at_tip (
                repository_id INTEGER NOT NULL,
                upload_id INTEGER NOT NULL,
                is_default_branch INTEGER NOT NULL,
                PRIMARY KEY (repository_id, upload_id, is_default_branch)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS repository_state (
                repository_id INTEGER PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                commits INTEGER NOT NULL,
                entries INTEGER NOT NULL,
                links INTEGER NOT NULL,
                tip_marks INTEGER NOT NULL
            )"
        ).execute(&self.pool).await?;

        if needs_rebuild {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)")
                .bind(SCHEMA_VERSION)
                .execute(&self.pool)
                .await?;
        }

        Ok(needs_rebuild)
    }

    /// Get metadata value by key
    pub async fn get_metadata(&self, key: &str) -> Option<String> {
        sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get("value"))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert or update catalog rows, keyed by upload id
    pub async fn save_uploads(&self, uploads: &[Upload]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in uploads.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO uploads (id, repository_id, commit_oid, root, indexer, state) "
            );
            qb.push_values(chunk, |mut row, upload| {
                row.push_bind(upload.id)
                    .push_bind(upload.repository_id)
                    .push_bind(upload.commit.as_bytes().as_slice())
                    .push_bind(upload.root.as_str())
                    .push_bind(upload.indexer.as_str())
                    .push_bind(upload.state.as_str());
            });
            qb.push(
                " ON CONFLICT(id) DO UPDATE SET \
                    repository_id = excluded.repository_id, \
                    commit_oid = excluded.commit_oid, \
                    root = excluded.root, \
                    indexer = excluded.indexer, \
                    state = excluded.state"
            );
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Load the upload catalog of a repository, ordered by id
    pub async fn load_uploads(&self, repository_id: RepositoryId) -> Result<Vec<Upload>> {
        let rows = sqlx::query(
            "SELECT id, repository_id, commit_oid, root, indexer, state FROM uploads \
             WHERE repository_id = ? ORDER BY id"
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Upload> {
                let state: String = row.get("state");
                Ok(Upload {
                    id: row.get("id"),
                    repository_id: row.get("repository_id"),
                    commit: commit_column(row, "commit_oid")?,
                    root: row.get("root"),
                    indexer: row.get("indexer"),
                    state: UploadState::parse(&state)
                        .with_context(|| format!("Unknown upload state: {}", state))?,
                })
            })
            .collect()
    }

    /// Swap the projection of one repository in a single transaction.
    ///
    /// Readers see either the previous projection or the new one; on any
    /// error the transaction is rolled back when dropped.
    pub async fn replace_projection_with_callback<F>(
        &self,
        projection: &Projection,
        state: &RepositoryState,
        mut on_progress: F,
    ) -> Result<()>
    where
        F: FnMut(usize),
    {
        let repository_id = projection.repository_id;
        let mut tx = self.pool.begin().await?;

        self.delete_projection_in_tx(&mut tx, repository_id).await?;
        self.save_entries_in_tx(&mut tx, projection, &mut on_progress).await?;
        self.save_links_in_tx(&mut tx, projection, &mut on_progress).await?;
        self.save_tip_marks_in_tx(&mut tx, projection).await?;

        sqlx::query(
            "INSERT OR REPLACE INTO repository_state \
             (repository_id, fingerprint, updated_at, commits, entries, links, tip_marks) \
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(state.repository_id)
        .bind(state.fingerprint.as_str())
        .bind(state.updated_at)
        .bind(state.commits)
        .bind(state.entries)
        .bind(state.links)
        .bind(state.tip_marks)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_projection_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        repository_id: RepositoryId,
    ) -> Result<()> {
        for table in ["nearest_uploads", "nearest_uploads_links", "uploads_visible_at_tip"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE repository_id = ?"))
                .bind(repository_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn save_entries_in_tx<F>(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        projection: &Projection,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(usize),
    {
        let encoded: Vec<(&CommitId, String)> = projection
            .entries
            .iter()
            .map(|(commit, entry)| -> Result<(&CommitId, String)> {
                Ok((commit, serde_json::to_string(&entry.to_rows())?))
            })
            .collect::<Result<_>>()?;

        for chunk in encoded.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO nearest_uploads (repository_id, commit_oid, uploads) "
            );
            qb.push_values(chunk, |mut row, (commit, uploads)| {
                row.push_bind(projection.repository_id)
                    .push_bind(commit.as_bytes().as_slice())
                    .push_bind(uploads.as_str());
            });
            qb.build().execute(&mut **tx).await?;
            on_progress(chunk.len());
        }

        Ok(())
    }

    async fn save_links_in_tx<F>(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        projection: &Projection,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(usize),
    {
        let links: Vec<&Link> = projection.links.values().collect();

        for chunk in links.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO nearest_uploads_links (repository_id, commit_oid, ancestor_oid, distance) "
            );
            qb.push_values(chunk, |mut row, link| {
                row.push_bind(projection.repository_id)
                    .push_bind(link.commit.as_bytes().as_slice())
                    .push_bind(link.ancestor.as_bytes().as_slice())
                    .push_bind(i64::from(link.distance));
            });
            qb.build().execute(&mut **tx).await?;
            on_progress(chunk.len());
        }

        Ok(())
    }

    async fn save_tip_marks_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        projection: &Projection,
    ) -> Result<()> {
        let marks: Vec<&TipMark> = projection.tip_marks.iter().collect();

        for chunk in marks.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO uploads_visible_at_tip (repository_id, upload_id, is_default_branch) "
            );
            qb.push_values(chunk, |mut row, mark| {
                row.push_bind(projection.repository_id)
                    .push_bind(mark.upload_id)
                    .push_bind(mark.is_default_branch);
            });
            qb.build().execute(&mut **tx).await?;
        }

        Ok(())
    }

    /// Full nearest-uploads entry stored for a commit, if any
    pub async fn load_nearest_entry(
        &self,
        repository_id: RepositoryId,
        commit: &CommitId,
    ) -> Result<Option<NearestEntry>> {
        let row = sqlx::query("SELECT uploads FROM nearest_uploads WHERE repository_id = ? AND commit_oid = ?")
            .bind(repository_id)
            .bind(commit.as_bytes().as_slice())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_entry(&row)).transpose()
    }

    /// Link stored for a commit, if any
    pub async fn load_link(&self, repository_id: RepositoryId, commit: &CommitId) -> Result<Option<Link>> {
        let row = sqlx::query(
            "SELECT commit_oid, ancestor_oid, distance FROM nearest_uploads_links \
             WHERE repository_id = ? AND commit_oid = ?"
        )
        .bind(repository_id)
        .bind(commit.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| decode_link(&row)).transpose()
    }

    /// Distinct upload ids marked at a tip; `default_branch_only` restricts to
    /// default-branch marks
    pub async fn load_tip_upload_ids(
        &self,
        repository_id: RepositoryId,
        default_branch_only: bool,
    ) -> Result<Vec<UploadId>> {
        let sql = if default_branch_only {
            "SELECT DISTINCT upload_id FROM uploads_visible_at_tip \
             WHERE repository_id = ? AND is_default_branch ORDER BY upload_id"
        } else {
            "SELECT DISTINCT upload_id FROM uploads_visible_at_tip \
             WHERE repository_id = ? ORDER BY upload_id"
        };
        let ids: Vec<i64> = sqlx::query_scalar(sql)
            .bind(repository_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Read back the whole stored projection of a repository
    pub async fn load_projection(&self, repository_id: RepositoryId) -> Result<Projection> {
        let mut projection = Projection::empty(repository_id);

        let rows = sqlx::query("SELECT commit_oid, uploads FROM nearest_uploads WHERE repository_id = ?")
            .bind(repository_id)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            projection.entries.insert(commit_column(row, "commit_oid")?, decode_entry(row)?);
        }

        let rows = sqlx::query(
            "SELECT commit_oid, ancestor_oid, distance FROM nearest_uploads_links WHERE repository_id = ?"
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            let link = decode_link(row)?;
            projection.links.insert(link.commit, link);
        }

        let rows = sqlx::query(
            "SELECT upload_id, is_default_branch FROM uploads_visible_at_tip WHERE repository_id = ?"
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            projection.tip_marks.insert(TipMark {
                repository_id,
                upload_id: row.get("upload_id"),
                is_default_branch: row.get("is_default_branch"),
            });
        }

        Ok(projection)
    }

    pub async fn load_repository_state(&self, repository_id: RepositoryId) -> Result<Option<RepositoryState>> {
        let row = sqlx::query(
            "SELECT repository_id, fingerprint, updated_at, commits, entries, links, tip_marks \
             FROM repository_state WHERE repository_id = ?"
        )
        .bind(repository_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| RepositoryState {
            repository_id: row.get("repository_id"),
            fingerprint: row.get("fingerprint"),
            updated_at: row.get("updated_at"),
            commits: row.get("commits"),
            entries: row.get("entries"),
            links: row.get("links"),
            tip_marks: row.get("tip_marks"),
        }))
    }

    /// Remove every row belonging to a repository in one transaction
    pub async fn delete_repository(&self, repository_id: RepositoryId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.delete_projection_in_tx(&mut tx, repository_id).await?;
        for table in ["uploads", "repository_state"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE repository_id = ?"))
                .bind(repository_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn commit_column(row: &SqliteRow, column: &str) -> Result<CommitId> {
    let bytes: Vec<u8> = row.try_get(column)?;
    CommitId::from_slice(&bytes).with_context(|| format!("Corrupt commit id in column {}", column))
}

fn decode_entry(row: &SqliteRow) -> Result<NearestEntry> {
    let json: String = row.try_get("uploads")?;
    let rows: Vec<NearestUpload> = serde_json::from_str(&json).context("Corrupt nearest_uploads row")?;
    Ok(NearestEntry::from_rows(rows))
}

fn decode_link(row: &SqliteRow) -> Result<Link> {
    let distance: i64 = row.try_get("distance")?;
    Ok(Link {
        commit: commit_column(row, "commit_oid")?,
        ancestor: commit_column(row, "ancestor_oid")?,
        distance: u32::try_from(distance).context("Link distance out of range")?,
    })
}
