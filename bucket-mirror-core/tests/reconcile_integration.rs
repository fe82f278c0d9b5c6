use bucket_mirror_core::content_type::ContentTypes;
use bucket_mirror_core::contract::{DeleteFailure, MockObjectStore};
use bucket_mirror_core::memory::MemoryStore;
use bucket_mirror_core::reconcile::{Reconciler, SyncInstance};
use bucket_mirror_core::KeyMapping;
use mockall::Sequence;
use std::collections::BTreeMap;
use std::fs::{create_dir_all, remove_file, write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn write_tree(root: &Path, files: &[&str]) {
    for rel in files {
        let path = root.join(rel);
        create_dir_all(path.parent().unwrap()).unwrap();
        write(&path, format!("content of {rel}")).unwrap();
    }
}

async fn open(root: &Path) -> SyncInstance {
    SyncInstance::open(root, ContentTypes::build(&BTreeMap::new()))
        .await
        .expect("Root should enumerate")
}

#[tokio::test]
async fn test_create_uploads_every_file_with_resolved_content_type() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html", "img/b.png"]);
    let store = MemoryStore::with_bucket("site");
    let reconciler = Reconciler::new(store.clone(), "site");

    let instance = open(tmp.path()).await;
    let report = reconciler.create(&instance).await.expect("Create should succeed");

    assert_eq!(report.uploaded, vec!["a.html", "img/b.png"]);
    assert_eq!(store.keys("site"), vec!["a.html", "img/b.png"]);

    let html = store.object("site", "a.html").unwrap();
    assert_eq!(html.content_type.as_deref(), Some("text/html"));
    assert_eq!(html.body, b"content of a.html");
    let png = store.object("site", "img/b.png").unwrap();
    assert_eq!(png.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_create_leaves_unknown_content_type_unset() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["README"]);
    let store = MemoryStore::with_bucket("site");

    Reconciler::new(store.clone(), "site")
        .create(&open(tmp.path()).await)
        .await
        .unwrap();

    assert_eq!(store.object("site", "README").unwrap().content_type, None);
}

#[tokio::test]
async fn test_create_of_empty_tree_uploads_nothing() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::with_bucket("site");

    let report = Reconciler::new(store.clone(), "site")
        .create(&open(tmp.path()).await)
        .await
        .unwrap();

    assert!(report.uploaded.is_empty());
    assert!(store.keys("site").is_empty());
}

#[tokio::test]
async fn test_create_then_read_round_trips_key_set() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["index.html", "css/site.css", "js/app.js", "img/logo.svg"]);
    let store = MemoryStore::with_bucket("site").with_page_size(2);
    let reconciler = Reconciler::new(store, "site").with_upload_concurrency(3);

    let instance = open(tmp.path()).await;
    reconciler.create(&instance).await.unwrap();
    let remote = reconciler.read(&instance.id()).await.unwrap();

    let uploaded: Vec<&str> = instance.files().store_keys().collect();
    let mut listed: Vec<&str> = remote.store_keys().collect();
    listed.sort();
    let mut expected = uploaded.clone();
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_create_into_missing_bucket_fails_with_store_error() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html"]);

    let err = Reconciler::new(MemoryStore::new(), "nope")
        .create(&open(tmp.path()).await)
        .await
        .unwrap_err();
    assert!(err.is_store());
    assert!(err.to_string().contains("NoSuchBucket"));
}

#[tokio::test]
async fn test_open_missing_root_fails_with_io_error() {
    let tmp = tempdir().unwrap();
    let err = SyncInstance::open(tmp.path().join("missing"), ContentTypes::default())
        .await
        .unwrap_err();
    assert!(err.is_io());
}

#[tokio::test]
async fn test_update_deletes_removed_then_uploads_added() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html", "b.css"]);
    let store = MemoryStore::with_bucket("site");
    let reconciler = Reconciler::new(store.clone(), "site");

    let first = open(tmp.path()).await;
    reconciler.create(&first).await.unwrap();

    remove_file(tmp.path().join("b.css")).unwrap();
    write_tree(tmp.path(), &["c.js"]);
    let second = open(tmp.path()).await;
    let report = reconciler.update(first.files(), &second).await.unwrap();

    assert_eq!(report.deleted, vec!["b.css"]);
    assert_eq!(report.uploaded, vec!["c.js"]);
    assert_eq!(report.unchanged, 1);
    assert_eq!(store.keys("site"), vec!["a.html", "c.js"]);
    assert_eq!(
        store.object("site", "c.js").unwrap().content_type.as_deref(),
        Some("application/javascript")
    );
}

#[tokio::test]
async fn test_update_does_not_touch_unchanged_files() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html"]);
    let store = MemoryStore::with_bucket("site");
    let reconciler = Reconciler::new(store.clone(), "site");
    let first = open(tmp.path()).await;
    reconciler.create(&first).await.unwrap();

    // Changed content under an unchanged identifier is not re-uploaded.
    write(tmp.path().join("a.html"), "edited").unwrap();
    let second = open(tmp.path()).await;
    let report = reconciler.update(first.files(), &second).await.unwrap();

    assert!(report.uploaded.is_empty());
    assert_eq!(store.object("site", "a.html").unwrap().body, b"content of a.html");
}

#[tokio::test]
async fn test_update_with_identical_mapping_issues_no_store_calls() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html", "img/b.png"]);
    let instance = open(tmp.path()).await;

    let mut store = MockObjectStore::new();
    store.expect_list_page().never();
    store.expect_put_object().never();
    store.expect_delete_objects().never();

    let report = Reconciler::new(store, "site")
        .update(&instance.files().clone(), &instance)
        .await
        .unwrap();
    assert!(report.uploaded.is_empty() && report.deleted.is_empty());
    assert_eq!(report.unchanged, 2);
}

#[tokio::test]
async fn test_update_through_differently_spelled_root_changes_nothing() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("public");
    write_tree(&root, &["a.html", "sub/b.css"]);
    let previous = open(&root).await;
    let again = open(&root.join("sub").join("..")).await;

    let mut store = MockObjectStore::new();
    store.expect_put_object().never();
    store.expect_delete_objects().never();

    let report = Reconciler::new(store, "site")
        .update(previous.files(), &again)
        .await
        .unwrap();
    assert!(report.uploaded.is_empty() && report.deleted.is_empty());
    assert_eq!(report.unchanged, 2);
    assert_eq!(again.id(), previous.id());
}

#[tokio::test]
async fn test_update_orders_delete_before_upload() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html", "c.js"]);
    let current = open(tmp.path()).await;

    let mut previous = KeyMapping::new();
    for (id, key) in current.files().iter().filter(|(_, key)| *key == "a.html") {
        previous.insert(id, key);
    }
    previous.insert("/old/root/b.css", "b.css");

    let mut seq = Sequence::new();
    let mut store = MockObjectStore::new();
    store
        .expect_delete_objects()
        .withf(|bucket, keys| bucket == "site" && keys == &vec!["b.css".to_string()])
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Vec::new()));
    store
        .expect_put_object()
        .withf(|req| req.key == "c.js" && req.content_type.as_deref() == Some("application/javascript"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let report = Reconciler::new(store, "site")
        .update(&previous, &current)
        .await
        .unwrap();
    assert_eq!(report.deleted, vec!["b.css"]);
    assert_eq!(report.uploaded, vec!["c.js"]);
}

#[tokio::test]
async fn test_update_aborts_before_uploads_when_delete_fails() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["new.html"]);
    let current = open(tmp.path()).await;

    let mut previous = KeyMapping::new();
    previous.insert("/old/x.css", "x.css");
    previous.insert("/old/y.css", "y.css");
    previous.insert("/old/z.css", "z.css");

    let mut store = MockObjectStore::new();
    store.expect_delete_objects().times(1).returning(|_, _| {
        Ok(vec![DeleteFailure {
            key: "y.css".to_string(),
            message: "InternalError".to_string(),
        }])
    });
    store.expect_put_object().never();

    let err = Reconciler::new(store, "site")
        .update(&previous, &current)
        .await
        .expect_err("Failed delete aborts the update");
    assert!(err.is_store());
    assert!(err.to_string().contains("site"));
}

#[tokio::test]
async fn test_upload_failure_aborts_create() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html", "b.html", "c.html", "d.html"]);
    let instance = open(tmp.path()).await;

    let attempts = Arc::new(Mutex::new(0usize));
    let attempts_in_mock = attempts.clone();
    let mut store = MockObjectStore::new();
    store.expect_put_object().returning(move |req| {
        *attempts_in_mock.lock().unwrap() += 1;
        if req.key == "b.html" {
            Err("503 Service Unavailable".into())
        } else {
            Ok(())
        }
    });

    let err = Reconciler::new(store, "site")
        .with_upload_concurrency(1)
        .create(&instance)
        .await
        .expect_err("A failing upload aborts create");
    assert!(err.is_store());
    assert!(err.to_string().contains("b.html"));
    // sequential uploads stop at the first failure
    assert_eq!(*attempts.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_delete_removes_every_recorded_key() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &["a.html", "img/b.png"]);
    let store = MemoryStore::with_bucket("site");
    store.insert("site", "unrelated.txt", "keep me");
    let reconciler = Reconciler::new(store.clone(), "site");

    let instance = open(tmp.path()).await;
    reconciler.create(&instance).await.unwrap();
    reconciler.delete(instance.files()).await.unwrap();

    assert_eq!(store.keys("site"), vec!["unrelated.txt"]);
}

#[tokio::test]
async fn test_delete_tolerates_already_missing_keys() {
    let store = MemoryStore::with_bucket("site");
    let mut recorded = KeyMapping::new();
    recorded.insert("/srv/a.html", "a.html");

    Reconciler::new(store, "site")
        .delete(&recorded)
        .await
        .expect("Deleting absent keys is not an error");
}
