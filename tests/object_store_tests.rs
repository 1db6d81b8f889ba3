use bytes::Bytes;
use filebox::object_store::{LocalStore, ObjectStore, ObjectStoreError};

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let data = Bytes::from("hello world");
    store.put("1/notes.txt", data.clone()).await.unwrap();

    let retrieved = store.get("1/notes.txt").await.unwrap();
    assert_eq!(retrieved, data);
    assert!(dir.path().join("1").join("notes.txt").is_file());
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    assert!(!store.exists("1/missing").await.unwrap());

    store.put("1/present", Bytes::from("data")).await.unwrap();
    assert!(store.exists("1/present").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("1/to-delete", Bytes::from("data")).await.unwrap();
    store.delete("1/to-delete").await.unwrap();
    assert!(!store.exists("1/to-delete").await.unwrap());

    // Deleting a nonexistent key should not error
    store.delete("1/to-delete").await.unwrap();
    store.delete("2/never-existed").await.unwrap();
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.get("1/missing").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("1/key", Bytes::from("first")).await.unwrap();
    store.put("1/key", Bytes::from("second")).await.unwrap();

    let data = store.get("1/key").await.unwrap();
    assert_eq!(data, Bytes::from("second"));
}

#[tokio::test]
async fn test_local_store_leaves_no_staging_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("1/a", Bytes::from("a")).await.unwrap();
    store.put("1/b", Bytes::from("b")).await.unwrap();

    let staged = std::fs::read_dir(dir.path().join(".staging")).unwrap().count();
    assert_eq!(staged, 0);
}

#[tokio::test]
async fn test_local_store_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("root")).unwrap();

    for key in ["../escape", "1/../../escape", "/abs", "1//x", "1/.", "1\\..\\x", ""] {
        let result = store.put(key, Bytes::from("x")).await;
        assert!(
            matches!(result, Err(ObjectStoreError::InvalidKey(_))),
            "key {key:?} should be rejected"
        );
        assert!(matches!(
            store.get(key).await,
            Err(ObjectStoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.delete(key).await,
            Err(ObjectStoreError::InvalidKey(_))
        ));
    }

    assert!(!dir.path().join("escape").exists());
}

#[tokio::test]
async fn test_local_store_failed_put_cleans_staging() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    // A directory in the way makes the final move fail.
    std::fs::create_dir_all(dir.path().join("1").join("taken").join("inner")).unwrap();
    let result = store.put("1/taken", Bytes::from("data")).await;
    assert!(matches!(result, Err(ObjectStoreError::Io(_))));

    let staged = std::fs::read_dir(dir.path().join(".staging")).unwrap().count();
    assert_eq!(staged, 0);
}
