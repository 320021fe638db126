use std::time::{Duration, Instant};

use super::*;
use crate::models::UserField;

/// Long enough that the background thread never fires during a test.
const NEVER: Duration = Duration::from_secs(3_600);

fn snapshot_ids(path: &std::path::Path) -> Vec<String> {
    let v: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    v["records"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap().to_string()).collect()
}

fn user(id: &str, uri: &str, token: Option<&str>) -> UserRecord {
    UserRecord { id: id.into(), goal_music_uri: uri.into(), access_token: token.map(str::to_string) }
}

#[tokio::test]
async fn upsert_reports_insert_then_match() {
    let c = MemoryCollection::new();
    assert_eq!(c.upsert(user("u1", "x", None)).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(c.upsert(user("u1", "y", None)).await.unwrap(), UpsertOutcome::Matched);
    assert_eq!(c.find_by_id("u1").await.unwrap().unwrap().goal_music_uri, "y");
    assert_eq!(c.len(), 1);
}

#[tokio::test]
async fn find_by_ids_skips_unknown_and_keeps_set_order() {
    let c = MemoryCollection::new();
    c.upsert(user("a", "1", None)).await.unwrap();
    c.upsert(user("b", "2", None)).await.unwrap();
    let found = c.find_by_ids(&IdSet::from_values(["b", "missing", "a"])).await.unwrap();
    let ids: Vec<_> = found.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[tokio::test]
async fn update_fields_counts_modified() {
    let c = MemoryCollection::new();
    let mut mask = FieldMask::default();
    mask.set(UserField::GoalMusicUri("new".into()));
    assert_eq!(c.update_fields("nobody", &mask).await.unwrap(), 0);

    c.upsert(user("u1", "old", Some("tok"))).await.unwrap();
    assert_eq!(c.update_fields("u1", &mask).await.unwrap(), 1);
    let stored = c.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(stored.goal_music_uri, "new");
    assert_eq!(stored.access_token.as_deref(), Some("tok"));
}

#[tokio::test]
async fn deletes_report_exact_counts() {
    let c = MemoryCollection::new();
    for id in ["a", "b", "c"] {
        c.upsert(user(id, "x", None)).await.unwrap();
    }
    assert_eq!(c.delete_one("a").await.unwrap(), 1);
    assert_eq!(c.delete_one("a").await.unwrap(), 0);
    assert_eq!(c.delete_many(&IdSet::from_values(["b,zzz"])).await.unwrap(), 1);
    assert_eq!(c.delete_many(&IdSet::from_values(["b", "zzz"])).await.unwrap(), 0);
    assert!(c.find_by_id("c").await.unwrap().is_some());
}

#[tokio::test]
async fn snapshot_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data").join("users.json");
    {
        let c = MemoryCollection::open(&path).unwrap();
        assert!(c.is_empty());
        c.upsert(user("u1", "x", Some("good"))).await.unwrap();
        c.upsert(user("u2", "y", None)).await.unwrap();
        c.delete_one("u2").await.unwrap();
        c.flush().await.unwrap();
    }
    let reopened = MemoryCollection::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    let r = reopened.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(r.access_token.as_deref(), Some("good"));
    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn writes_do_not_touch_the_file_until_a_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("users.json");
    let c = MemoryCollection::open_with_interval(&path, NEVER).unwrap();
    assert!(!c.is_dirty());
    c.upsert(user("u1", "x", None)).await.unwrap();
    assert!(c.is_dirty());
    assert!(!path.exists());

    c.flush().await.unwrap();
    assert!(!c.is_dirty());
    assert_eq!(snapshot_ids(&path), vec!["u1"]);
}

#[tokio::test]
async fn no_op_mutations_leave_collection_clean() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("users.json");
    let c = MemoryCollection::open_with_interval(&path, NEVER).unwrap();
    let mut mask = FieldMask::default();
    mask.set(UserField::GoalMusicUri("y".into()));
    assert_eq!(c.update_fields("ghost", &mask).await.unwrap(), 0);
    assert_eq!(c.delete_one("ghost").await.unwrap(), 0);
    assert_eq!(c.delete_many(&IdSet::from_values(["ghost"])).await.unwrap(), 0);
    assert!(!c.is_dirty());
}

#[tokio::test]
async fn background_snapshot_persists_dirty_collection() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("users.json");
    let c = MemoryCollection::open_with_interval(&path, Duration::from_millis(20)).unwrap();
    c.upsert(user("u1", "x", None)).await.unwrap();
    c.upsert(user("u2", "y", None)).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while c.is_dirty() || !path.exists() {
        assert!(Instant::now() < deadline, "background snapshot never ran");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(snapshot_ids(&path), vec!["u1", "u2"]);
    drop(c);

    let reopened = MemoryCollection::open_with_interval(&path, NEVER).unwrap();
    assert_eq!(reopened.len(), 2);
}

#[tokio::test]
async fn failed_flush_keeps_collection_dirty() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("users.json");
    let c = MemoryCollection::open_with_interval(&path, NEVER).unwrap();
    c.upsert(user("u1", "x", None)).await.unwrap();
    // a directory where the temp file should go makes the write fail
    std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
    assert!(matches!(c.flush().await, Err(StoreError::Io(_))));
    assert!(c.is_dirty());
    assert!(c.find_by_id("u1").await.unwrap().is_some());

    std::fs::remove_dir(path.with_extension("json.tmp")).unwrap();
    c.flush().await.unwrap();
    assert!(!c.is_dirty());
    assert_eq!(snapshot_ids(&path), vec!["u1"]);
}

#[test]
fn open_rejects_unknown_snapshot_version() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("users.json");
    std::fs::write(&path, r#"{"version": 99, "collection": "users", "records": []}"#).unwrap();
    match MemoryCollection::open(&path) {
        Err(StoreError::Snapshot(msg)) => assert!(msg.contains("99")),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("expected version error"),
    }
}

#[test]
fn open_rejects_corrupt_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("users.json");
    std::fs::write(&path, b"not json").unwrap();
    assert!(matches!(MemoryCollection::open(&path), Err(StoreError::Serde(_))));
}

#[tokio::test]
async fn shared_collection_derefs_to_trait() {
    let shared = SharedCollection::in_memory();
    let clone = shared.clone();
    shared.upsert(user("u1", "x", None)).await.unwrap();
    assert!(clone.find_by_id("u1").await.unwrap().is_some());
}
