//! Tests for sessions sharing, or not sharing, a working root.
//!
//! Sessions opened on the same working root alias one tree: whichever
//! loaded last determines what every one of them sees. This is a known
//! hazard of shared roots and the first test pins it down so a change in
//! behavior is noticed. Isolated roots do not alias.

use std::path::Path;
use tarshell::{FileSystem, HostFs, Session};

/// Build an archive whose tree holds a single marker file.
async fn marker_archive(dir: &Path, name: &str, marker: &str) -> std::path::PathBuf {
    let archive = dir.join(format!("{}.tar", name));
    let root = dir.join(format!("build_{}", name)).join("virtual_fs");
    let fs = HostFs::new();
    fs.mkdir(&root, true).await.unwrap();
    fs.write_file(&root.join(marker), b"marker").await.unwrap();

    let data = tarshell::archive::pack(&fs, &root, tarshell::archive::Compression::None)
        .await
        .unwrap();
    fs.write_file(&archive, &data).await.unwrap();
    archive
}

/// KNOWN HAZARD: a shared working root is overwritten by the last session to load
#[tokio::test]
async fn shared_work_root_aliases_sessions_known_race() {
    let tmp = tempfile::tempdir().unwrap();
    let shared = tmp.path().join("shared").join("virtual_fs");
    let first_archive = marker_archive(tmp.path(), "first", "first.txt").await;
    let second_archive = marker_archive(tmp.path(), "second", "second.txt").await;

    let mut first = Session::builder("first", first_archive)
        .work_root(&shared)
        .open()
        .await
        .unwrap();
    assert_eq!(first.execute("ls").await.stdout, "first.txt");

    let mut second = Session::builder("second", second_archive)
        .work_root(&shared)
        .open()
        .await
        .unwrap();

    // The first session now observes the second session's tree
    assert_eq!(first.execute("ls").await.stdout, "second.txt");
    assert_eq!(second.execute("ls").await.stdout, "second.txt");
}

#[tokio::test]
async fn distinct_work_roots_do_not_alias() {
    let tmp = tempfile::tempdir().unwrap();
    let first_archive = marker_archive(tmp.path(), "first", "first.txt").await;
    let second_archive = marker_archive(tmp.path(), "second", "second.txt").await;

    let mut first = Session::builder("first", first_archive)
        .work_root(tmp.path().join("first_root").join("virtual_fs"))
        .open()
        .await
        .unwrap();
    let mut second = Session::builder("second", second_archive)
        .work_root(tmp.path().join("second_root").join("virtual_fs"))
        .open()
        .await
        .unwrap();

    assert_eq!(first.execute("ls").await.stdout, "first.txt");
    assert_eq!(second.execute("ls").await.stdout, "second.txt");
}

#[tokio::test]
async fn isolated_roots_are_derived_from_identity() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("fs.tar");
    // Unique identities keep parallel test runs apart
    let suffix = tmp
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .replace('.', "");

    let alice = Session::builder(format!("alice{}", suffix), &archive)
        .isolated()
        .open()
        .await
        .unwrap();
    let bob = Session::builder(format!("bob{}", suffix), &archive)
        .isolated()
        .open()
        .await
        .unwrap();

    assert_ne!(alice.work_root(), bob.work_root());
    assert!(alice.work_root().starts_with(std::env::temp_dir()));
    assert!(bob.work_root().join("some_directory").is_dir());

    for root in [alice.work_root(), bob.work_root()] {
        if let Some(parent) = root.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
