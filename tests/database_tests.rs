// Database integration tests
// Tests SQLite operations in isolation using in-memory database

mod common;

use common::{c, chain, setup_db, tip, upload};
use uploadgraph::graph;
use uploadgraph::model::{Link, Projection, TipMark, UploadState};
use uploadgraph::repository::{Database, NoopProgress, RepositoryState, SCHEMA_VERSION};

fn state_for(projection: &Projection, fingerprint: &str) -> RepositoryState {
    RepositoryState {
        repository_id: projection.repository_id,
        fingerprint: fingerprint.to_string(),
        updated_at: 1_700_000_000,
        commits: 4,
        entries: projection.entries.len() as i64,
        links: projection.links.len() as i64,
        tip_marks: projection.tip_marks.len() as i64,
    }
}

async fn store_projection(db: &Database, projection: &Projection, fingerprint: &str) {
    db.replace_projection_with_callback(projection, &state_for(projection, fingerprint), |_| {})
        .await
        .unwrap();
}

fn sample_projection(repository_id: i64) -> Projection {
    let uploads = vec![upload(1, c(1), "", "go"), upload(2, c(2), "web/", "ts")];
    let tips = vec![tip(c(4), true), tip(c(3), false)];
    graph::compute_projection(repository_id, &chain(4), &tips, &uploads).unwrap()
}

#[tokio::test]
async fn test_schema_init() {
    let db = common::create_test_db().await;

    // First init should return true (schema was rebuilt/created)
    let rebuilt = db.init_schema().await.unwrap();
    assert!(rebuilt, "First init_schema should return true");

    // Second init should return false (schema exists and version matches)
    let rebuilt = db.init_schema().await.unwrap();
    assert!(!rebuilt, "Second init_schema should return false");

    let version = db.get_metadata("schema_version").await;
    assert_eq!(version.as_deref(), Some(SCHEMA_VERSION));
}

#[tokio::test]
async fn test_schema_version_change_rebuilds() {
    let db = setup_db().await;
    db.save_uploads(&[upload(1, c(1), "", "go")]).await.unwrap();

    db.set_metadata("schema_version", "0").await.unwrap();
    assert!(db.init_schema().await.unwrap());
    assert!(db.load_uploads(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metadata_roundtrip() {
    let db = setup_db().await;

    db.set_metadata("test_key", "test_value").await.unwrap();
    assert_eq!(db.get_metadata("test_key").await.as_deref(), Some("test_value"));

    db.set_metadata("test_key", "updated_value").await.unwrap();
    assert_eq!(db.get_metadata("test_key").await.as_deref(), Some("updated_value"));

    assert!(db.get_metadata("nonexistent").await.is_none());
}

#[tokio::test]
async fn test_save_uploads_upserts_by_id() {
    let db = setup_db().await;

    let mut first = upload(7, c(1), "lib/", "go");
    first.state = UploadState::Processing;
    let mut other_repo = upload(8, c(2), "", "go");
    other_repo.repository_id = 2;
    db.save_uploads(&[first.clone(), other_repo]).await.unwrap();

    first.state = UploadState::Completed;
    db.save_uploads(&[first.clone()]).await.unwrap();

    let uploads = db.load_uploads(1).await.unwrap();
    assert_eq!(uploads, vec![first]);
    assert_eq!(db.load_uploads(2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_projection_roundtrip() {
    let db = setup_db().await;
    let projection = sample_projection(1);
    assert!(!projection.entries.is_empty());
    assert!(!projection.links.is_empty());

    store_projection(&db, &projection, "abc").await;

    assert_eq!(db.load_projection(1).await.unwrap(), projection);
    let state = db.load_repository_state(1).await.unwrap().unwrap();
    assert_eq!(state, state_for(&projection, "abc"));
}

#[tokio::test]
async fn test_entry_and_link_rows() {
    let db = setup_db().await;
    let projection = sample_projection(1);
    store_projection(&db, &projection, "abc").await;

    let entry = db.load_nearest_entry(1, &c(2)).await.unwrap().unwrap();
    assert_eq!(&entry, projection.entries.get(&c(2)).unwrap());

    let link = db.load_link(1, &c(4)).await.unwrap().unwrap();
    assert_eq!(link, Link { commit: c(4), ancestor: c(2), distance: 2 });

    assert!(db.load_nearest_entry(1, &c(99)).await.unwrap().is_none());
    assert!(db.load_link(2, &c(4)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_tip_upload_ids() {
    let db = setup_db().await;
    let projection = sample_projection(1);
    store_projection(&db, &projection, "abc").await;

    assert_eq!(db.load_tip_upload_ids(1, true).await.unwrap(), projection.visible_upload_ids());
    assert_eq!(db.load_tip_upload_ids(1, false).await.unwrap(), projection.protected_upload_ids());
    assert_eq!(db.load_tip_upload_ids(1, false).await.unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_replace_drops_previous_rows() {
    let db = setup_db().await;
    store_projection(&db, &sample_projection(1), "first").await;

    let smaller = graph::compute_projection(1, &chain(2), &[tip(c(2), true)], &[upload(9, c(2), "", "go")]).unwrap();
    store_projection(&db, &smaller, "second").await;

    assert_eq!(db.load_projection(1).await.unwrap(), smaller);
    assert!(db.load_link(1, &c(4)).await.unwrap().is_none());
    assert_eq!(db.load_repository_state(1).await.unwrap().unwrap().fingerprint, "second");
}

#[tokio::test]
async fn test_replace_leaves_other_repositories_alone() {
    let db = setup_db().await;
    let one = sample_projection(1);
    let two = sample_projection(2);
    store_projection(&db, &one, "one").await;
    store_projection(&db, &two, "two").await;

    store_projection(&db, &Projection::empty(1), "empty").await;

    assert!(db.load_projection(1).await.unwrap().is_empty());
    assert_eq!(db.load_projection(2).await.unwrap(), two);
}

#[tokio::test]
async fn test_progress_counts_rows() {
    let db = setup_db().await;
    let projection = sample_projection(1);
    let mut counted = 0;
    db.replace_projection_with_callback(&projection, &state_for(&projection, "x"), |n| counted += n)
        .await
        .unwrap();

    assert_eq!(counted, projection.entries.len() + projection.links.len());
}

#[tokio::test]
async fn test_store_trait_reads_through() {
    use uploadgraph::repository::IndexStore;

    let db = setup_db().await;
    let projection = sample_projection(1);
    db.replace_projection(&projection, &state_for(&projection, "fp"), &NoopProgress)
        .await
        .unwrap();

    assert_eq!(db.get_fingerprint(1).await.as_deref(), Some("fp"));
    assert!(db.get_fingerprint(2).await.is_none());
    assert_eq!(db.visible_upload_ids(1).await.unwrap(), projection.visible_upload_ids());
}

#[tokio::test]
async fn test_delete_repository() {
    let db = setup_db().await;
    db.save_uploads(&[upload(1, c(1), "", "go")]).await.unwrap();
    store_projection(&db, &sample_projection(1), "abc").await;
    store_projection(&db, &sample_projection(2), "def").await;

    db.delete_repository(1).await.unwrap();

    assert!(db.load_uploads(1).await.unwrap().is_empty());
    assert!(db.load_projection(1).await.unwrap().is_empty());
    assert!(db.load_repository_state(1).await.unwrap().is_none());
    assert!(!db.load_projection(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_swap_keeps_previous_projection() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("index.db");
    let path = path.to_str().unwrap();
    let db = Database::new(path).await.unwrap();
    db.init_schema().await.unwrap();

    let first = sample_projection(1);
    store_projection(&db, &first, "first").await;

    // Tip marks are written last, after the old rows are already deleted
    let other = sqlx::SqlitePool::connect(&format!("sqlite:{}", path)).await.unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_tip_marks BEFORE INSERT ON uploads_visible_at_tip \
         BEGIN SELECT RAISE(ABORT, 'tip marks rejected'); END"
    )
    .execute(&other)
    .await
    .unwrap();
    other.close().await;

    let second = graph::compute_projection(1, &chain(3), &[tip(c(3), true)], &[upload(9, c(2), "", "go")]).unwrap();
    assert!(!second.tip_marks.is_empty());
    let err = db
        .replace_projection_with_callback(&second, &state_for(&second, "second"), |_| {})
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("tip marks rejected"));

    assert_eq!(db.load_projection(1).await.unwrap(), first);
    assert_eq!(db.load_repository_state(1).await.unwrap(), Some(state_for(&first, "first")));
}

#[tokio::test]
async fn test_tip_marks_stored_under_projection_repository() {
    let db = setup_db().await;
    let mut projection = sample_projection(1);
    projection.tip_marks = projection
        .tip_marks
        .iter()
        .map(|mark| TipMark { repository_id: 99, ..*mark })
        .collect();

    store_projection(&db, &projection, "first").await;
    // Replacing again must clear the previous marks rather than collide with them
    store_projection(&db, &projection, "second").await;

    assert_eq!(db.load_tip_upload_ids(1, false).await.unwrap(), vec![1, 2]);
    assert!(db.load_tip_upload_ids(99, false).await.unwrap().is_empty());
}
