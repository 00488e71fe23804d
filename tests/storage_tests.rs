use std::io::Read;
use std::sync::Arc;
use std::thread;

use drive::config::StorageConfig;
use drive::storage::{StorageError, StorageManager};
use serde_json::{json, Value};

const MAX_UPLOAD: u64 = 64 * 1024;

fn test_manager() -> (tempfile::TempDir, StorageManager) {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        root: dir.path().join("storage").to_string_lossy().to_string(),
        ..StorageConfig::default()
    };
    let manager = StorageManager::open(&config, MAX_UPLOAD).unwrap();
    (dir, manager)
}

fn download(manager: &StorageManager, raw: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    manager
        .download(raw)
        .unwrap()
        .read_to_end(&mut buf)
        .unwrap();
    buf
}

/// Every entry in the root apart from the catalog.
fn stored_entries(manager: &StorageManager) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(manager.root())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n != "metadata.json")
        .collect();
    names.sort();
    names
}

#[test]
fn test_open_initializes_catalog() {
    let (_dir, manager) = test_manager();

    let text = std::fs::read_to_string(manager.root().join("metadata.json")).unwrap();
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({}));
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn test_upload_download_round_trip() {
    let (_dir, manager) = test_manager();

    let content: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let file = manager.upload("data.bin", &content[..]).unwrap();

    assert_eq!(file.name, "data.bin");
    assert_eq!(file.size, 10_000);
    assert_eq!(file.download_url, "/api/files/data.bin/download");
    assert!(file.metadata.is_empty());

    assert_eq!(download(&manager, "data.bin"), content);
}

#[test]
fn test_upload_at_limit_round_trips() {
    let (_dir, manager) = test_manager();

    let content = vec![0xAB; MAX_UPLOAD as usize];
    manager.upload("full.bin", &content[..]).unwrap();
    assert_eq!(download(&manager, "full.bin"), content);
}

#[test]
fn test_upload_creates_empty_metadata() {
    let (_dir, manager) = test_manager();

    manager.upload("a.txt", &b"a"[..]).unwrap();
    assert!(manager.metadata().load().contains_key("a.txt"));
    assert!(manager.get_metadata("a.txt").unwrap().is_empty());
}

#[test]
fn test_reupload_keeps_metadata() {
    let (_dir, manager) = test_manager();

    manager.upload("a.txt", &b"first"[..]).unwrap();
    manager.set_metadata("a.txt", json!({"title": "A"})).unwrap();

    let file = manager.upload("a.txt", &b"second"[..]).unwrap();
    assert_eq!(Value::Object(file.metadata), json!({"title": "A"}));
    assert_eq!(download(&manager, "a.txt"), b"second");
}

#[test]
fn test_upload_sanitizes_name() {
    let (_dir, manager) = test_manager();

    let file = manager.upload("../../etc/passwd", &b"nope"[..]).unwrap();
    assert_eq!(file.name, "etc_passwd");
    assert_eq!(stored_entries(&manager), vec!["etc_passwd"]);
    assert_eq!(download(&manager, "../../etc/passwd"), b"nope");
}

#[test]
fn test_traversal_never_writes_outside_root() {
    let (dir, manager) = test_manager();

    for raw in ["../escape.txt", "../../escape.txt", "/tmp/escape.txt", "..\\escape.txt"] {
        manager.upload(raw, &b"x"[..]).unwrap();
    }

    assert!(!dir.path().join("escape.txt").exists());
    for file in manager.list().unwrap() {
        assert!(manager.root().join(&file.name).is_file());
    }
}

#[test]
fn test_upload_invalid_name_creates_nothing() {
    let (_dir, manager) = test_manager();

    for raw in ["", "   ", "/", "////", "\\", "..", "../.."] {
        assert!(
            matches!(
                manager.upload(raw, &b"data"[..]),
                Err(StorageError::InvalidName(_))
            ),
            "{raw:?}"
        );
    }

    assert!(stored_entries(&manager).is_empty());
    assert!(manager.metadata().load().is_empty());
}

#[test]
fn test_catalog_name_is_reserved() {
    let (_dir, manager) = test_manager();

    assert!(matches!(
        manager.upload("metadata.json", &b"{}"[..]),
        Err(StorageError::InvalidName(_))
    ));
    assert!(matches!(
        manager.delete("metadata.json"),
        Err(StorageError::InvalidName(_))
    ));
    assert!(matches!(
        manager.download("metadata.json"),
        Err(StorageError::InvalidName(_))
    ));
}

#[test]
fn test_upload_too_large_leaves_nothing() {
    let (_dir, manager) = test_manager();

    let content = vec![1u8; MAX_UPLOAD as usize + 1];
    assert!(matches!(
        manager.upload("big.bin", &content[..]),
        Err(StorageError::PayloadTooLarge { limit: MAX_UPLOAD })
    ));

    assert!(stored_entries(&manager).is_empty());
    assert!(manager.metadata().load().is_empty());
}

#[test]
fn test_list_sorted_case_insensitive() {
    let (_dir, manager) = test_manager();

    for name in ["b.txt", "A.txt", "c.txt"] {
        manager.upload(name, &b"x"[..]).unwrap();
    }

    let names: Vec<String> = manager.list().unwrap().into_iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["A.txt", "b.txt", "c.txt"]);
}

#[test]
fn test_list_includes_metadata() {
    let (_dir, manager) = test_manager();

    manager.upload("a.txt", &b"x"[..]).unwrap();
    manager.set_metadata("a.txt", json!({"k": [1, 2]})).unwrap();

    let files = manager.list().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(Value::Object(files[0].metadata.clone()), json!({"k": [1, 2]}));
}

#[test]
fn test_list_tolerates_file_without_metadata() {
    let (_dir, manager) = test_manager();

    std::fs::write(manager.root().join("copied-in.txt"), "x").unwrap();

    let files = manager.list().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "copied-in.txt");
    assert!(files[0].metadata.is_empty());
}

#[test]
fn test_download_missing() {
    let (_dir, manager) = test_manager();

    assert!(matches!(
        manager.download("missing.txt"),
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        manager.download(""),
        Err(StorageError::InvalidName(_))
    ));
}

#[test]
fn test_delete_removes_file_and_metadata() {
    let (_dir, manager) = test_manager();

    manager.upload("a.txt", &b"x"[..]).unwrap();
    manager.set_metadata("a.txt", json!({"k": 1})).unwrap();

    let name = manager.delete("a.txt").unwrap();
    assert_eq!(name.as_str(), "a.txt");
    assert!(manager.list().unwrap().is_empty());
    assert!(!manager.metadata().load().contains_key("a.txt"));
}

#[test]
fn test_delete_twice_is_not_found_both_times() {
    let (_dir, manager) = test_manager();

    manager.upload("a.txt", &b"x"[..]).unwrap();
    manager.delete("a.txt").unwrap();

    for _ in 0..2 {
        assert!(matches!(
            manager.delete("a.txt"),
            Err(StorageError::NotFound(_))
        ));
    }
}

#[test]
fn test_delete_missing_file_keeps_metadata() {
    let (_dir, manager) = test_manager();

    manager.set_metadata("staged.txt", json!({"pre": true})).unwrap();

    assert!(matches!(
        manager.delete("staged.txt"),
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(
        Value::Object(manager.get_metadata("staged.txt").unwrap()),
        json!({"pre": true})
    );
}

#[test]
fn test_metadata_round_trip_without_file() {
    let (_dir, manager) = test_manager();

    manager.set_metadata("ghost.txt", json!({"a": 1})).unwrap();
    assert_eq!(
        Value::Object(manager.get_metadata("ghost.txt").unwrap()),
        json!({"a": 1})
    );
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn test_metadata_round_trip_with_file() {
    let (_dir, manager) = test_manager();

    manager.upload("real.txt", &b"x"[..]).unwrap();
    manager.set_metadata("real.txt", json!({"a": 1})).unwrap();
    assert_eq!(
        Value::Object(manager.get_metadata("real.txt").unwrap()),
        json!({"a": 1})
    );
}

#[test]
fn test_metadata_uses_sanitized_name() {
    let (_dir, manager) = test_manager();

    let name = manager.set_metadata("my file.txt", json!({"a": 1})).unwrap();
    assert_eq!(name.as_str(), "my_file.txt");
    assert_eq!(
        Value::Object(manager.get_metadata("my_file.txt").unwrap()),
        json!({"a": 1})
    );
}

#[test]
fn test_set_metadata_rejects_non_object() {
    let (_dir, manager) = test_manager();

    assert!(matches!(
        manager.set_metadata("a.txt", json!([1, 2])),
        Err(StorageError::InvalidMetadata)
    ));
    assert!(matches!(
        manager.set_metadata("", json!({})),
        Err(StorageError::InvalidName(_))
    ));
}

#[test]
fn test_get_metadata_missing_is_empty() {
    let (_dir, manager) = test_manager();
    assert!(manager.get_metadata("never.txt").unwrap().is_empty());
}

#[test]
fn test_corrupt_catalog_does_not_block_files() {
    let (_dir, manager) = test_manager();

    manager.upload("a.txt", &b"x"[..]).unwrap();
    std::fs::write(manager.metadata().path(), "garbage").unwrap();

    let files = manager.list().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].metadata.is_empty());

    manager.upload("b.txt", &b"y"[..]).unwrap();
    manager.delete("a.txt").unwrap();
    assert_eq!(download(&manager, "b.txt"), b"y");
}

#[test]
fn test_sweep_orphans() {
    let (_dir, manager) = test_manager();

    manager.upload("kept.txt", &b"x"[..]).unwrap();
    manager.set_metadata("kept.txt", json!({"k": 1})).unwrap();
    manager.set_metadata("orphan-1.txt", json!({})).unwrap();
    manager.set_metadata("orphan-2.txt", json!({"o": 2})).unwrap();

    assert_eq!(manager.sweep_orphans().unwrap(), 2);
    assert_eq!(manager.sweep_orphans().unwrap(), 0);

    let catalog = manager.metadata().load();
    assert_eq!(catalog.len(), 1);
    assert_eq!(Value::Object(catalog["kept.txt"].clone()), json!({"k": 1}));
}

#[test]
fn test_concurrent_set_metadata_no_lost_updates() {
    let (_dir, manager) = test_manager();
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                manager
                    .set_metadata(&format!("doc-{i}.txt"), json!({"i": i}))
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let catalog = manager.metadata().load();
    assert_eq!(catalog.len(), 24);
    for i in 0..24 {
        assert_eq!(catalog[&format!("doc-{i}.txt")]["i"], json!(i));
    }
}

#[test]
fn test_concurrent_uploads_all_get_metadata() {
    let (_dir, manager) = test_manager();
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let content = format!("content {i}");
                manager
                    .upload(&format!("up-{i}.txt"), content.as_bytes())
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.list().unwrap().len(), 16);
    assert_eq!(manager.metadata().load().len(), 16);
    for i in 0..16 {
        assert_eq!(
            download(&manager, &format!("up-{i}.txt")),
            format!("content {i}").into_bytes()
        );
    }
}

#[test]
fn test_concurrent_overwrite_reads_whole_versions() {
    let (_dir, manager) = test_manager();
    let manager = Arc::new(manager);

    let a = vec![b'a'; 32 * 1024];
    let b = vec![b'b'; 32 * 1024];
    manager.upload("shared.bin", &a[..]).unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        let (a, b) = (a.clone(), b.clone());
        thread::spawn(move || {
            for i in 0..20 {
                let content = if i % 2 == 0 { &b } else { &a };
                manager.upload("shared.bin", &content[..]).unwrap();
            }
        })
    };

    for _ in 0..20 {
        let content = download(&manager, "shared.bin");
        assert!(content == a || content == b, "observed a mixed file");
    }

    writer.join().unwrap();
}
