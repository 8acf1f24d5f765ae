//! Path builders for repository storage: index, objects, and config locations relative to the working directory.

use std::path::PathBuf;

use crate::utils::util;

pub fn index() -> PathBuf {
    util::storage_path().join("index")
}

pub fn objects() -> PathBuf {
    util::storage_path().join("objects")
}

pub fn config() -> PathBuf {
    util::storage_path().join("config")
}
