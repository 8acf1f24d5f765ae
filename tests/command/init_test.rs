//! Integration tests for repository initialization.

use std::fs;

use serial_test::serial;
use tempfile::tempdir;

use mend::cli;
use mend::internal::index::Index;
use mend::utils::test::ChangeDirGuard;

#[test]
#[serial]
fn test_init_in_empty_dir() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    let code = cli::parse(Some(&["mend", "init", "--quiet"])).unwrap();
    assert_eq!(code, 0);

    let storage = temp.path().join(".mend");
    assert!(storage.join("objects").is_dir());
    assert!(storage.join("config").is_file());
    assert_eq!(Index::load(storage.join("index")).unwrap().size(), 0);
}

#[test]
#[serial]
fn test_init_with_repo_directory() {
    let temp = tempdir().unwrap();
    let target = temp.path().join("nested/project");
    fs::create_dir_all(&target).unwrap();
    let target_str = target.to_str().unwrap();

    let code = cli::parse(Some(&[
        "mend",
        "init",
        "--quiet",
        "--repo-directory",
        target_str,
    ]))
    .unwrap();
    assert_eq!(code, 0);
    assert!(target.join(".mend/objects").is_dir());
}

#[test]
#[serial]
fn test_double_init_is_not_fatal() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    assert_eq!(cli::parse(Some(&["mend", "init", "--quiet"])).unwrap(), 0);
    assert_eq!(cli::parse(Some(&["mend", "init", "--quiet"])).unwrap(), 0);
}
