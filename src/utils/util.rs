//! Repository discovery and working-directory file helpers shared by every command.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the repository metadata directory.
pub const ROOT_DIR: &str = ".mend";

/// Walk up from the current directory looking for the repository storage dir.
pub fn try_get_storage_path() -> Result<PathBuf, io::Error> {
    let mut cur = cur_dir();
    loop {
        let candidate = cur.join(ROOT_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        match cur.parent() {
            Some(parent) => cur = parent.to_path_buf(),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{ROOT_DIR} not found in current directory or any parent"),
                ))
            }
        }
    }
}

pub fn storage_path() -> PathBuf {
    try_get_storage_path().unwrap()
}

/// The working directory of the repository (parent of the storage dir).
pub fn working_dir() -> PathBuf {
    let mut path = storage_path();
    path.pop();
    path
}

pub fn check_repo_exist() -> bool {
    if try_get_storage_path().is_err() {
        eprintln!("fatal: not a mend repository (or any of the parent directories): {ROOT_DIR}");
        return false;
    }
    true
}

pub fn repo_exists() -> bool {
    try_get_storage_path().is_ok()
}

pub fn cur_dir() -> PathBuf {
    env::current_dir().unwrap()
}

/// Turn a user-supplied path (absolute or relative to the current directory)
/// into a path relative to the working directory.
pub fn to_workdir_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cur_dir().join(path)
    };
    match abs.strip_prefix(working_dir()) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => abs,
    }
}

pub fn workdir_to_absolute<P: AsRef<Path>>(path: P) -> PathBuf {
    working_dir().join(path.as_ref())
}

/// Write `data` to `path`, creating parent directories as needed.
pub fn write_file(data: &[u8], path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, data)
}

/// Remove now-empty parent directories after a file deletion, stopping at
/// the working directory (or wherever a directory is still non-empty).
pub fn clear_empty_dir(path: &Path) {
    let workdir = try_get_storage_path().ok().map(|mut p| {
        p.pop();
        p
    });
    let mut cur = path.parent();
    while let Some(dir) = cur {
        if dir.as_os_str().is_empty() || workdir.as_deref() == Some(dir) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        cur = dir.parent();
    }
}

/// File mode of an on-disk path in the octal form patches use.
#[cfg(unix)]
pub fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    let mode = meta.mode();
    if meta.file_type().is_symlink() {
        0o120000
    } else if mode & 0o111 != 0 {
        0o100755
    } else {
        0o100644
    }
}

#[cfg(not(unix))]
pub fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.file_type().is_symlink() {
        0o120000
    } else {
        0o100644
    }
}
