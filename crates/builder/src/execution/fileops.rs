//! Filesystem actions

use apkpipe_errors::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Remove `path` if present and recreate it empty.
///
/// # Errors
///
/// Returns an error if the directory cannot be removed or created.
pub async fn make_clean_dir(path: &Path) -> Result<(), Error> {
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io_with_path(&e, path)),
    }
    mkdir(path).await
}

/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn mkdir(path: &Path) -> Result<(), Error> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))
}

/// Recursively copy the contents of `source` into `destination`.
///
/// Returns the number of files copied.
///
/// # Errors
///
/// Returns an error if `source` cannot be walked or a file cannot be copied.
pub async fn copy_dir_contents(source: &Path, destination: &Path) -> Result<usize, Error> {
    let source = source.to_path_buf();
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree(&source, &destination))
        .await
        .map_err(|e| Error::internal(format!("copy task failed: {e}")))?
}

fn copy_tree(source: &Path, destination: &Path) -> Result<usize, Error> {
    std::fs::create_dir_all(destination).map_err(|e| Error::io_with_path(&e, destination))?;
    let mut copied = 0;
    for entry in walkdir::WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::internal(format!("walk {}: {e}", source.display())))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::internal(e.to_string()))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| Error::io_with_path(&e, &target))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| Error::io_with_path(&e, entry.path()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy one ABI subtree. A missing source is skipped and reported as `false`.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub async fn copy_native_abi(source: &Path, destination: &Path) -> Result<bool, Error> {
    if !fs::try_exists(source).await.map_err(|e| Error::io_with_path(&e, source))? {
        return Ok(false);
    }
    copy_dir_contents(source, destination).await?;
    Ok(true)
}

/// Link each entry (relative to `root`) to `destination/<entry>`.
///
/// # Errors
///
/// Returns an error if a parent directory or link cannot be created.
pub async fn symlink_files(root: &Path, entries: &[PathBuf], destination: &Path) -> Result<(), Error> {
    for entry in entries {
        let link = destination.join(entry);
        if let Some(parent) = link.parent() {
            mkdir(parent).await?;
        }
        let target = root.join(entry);
        link_path(&target, &link)
            .await
            .map_err(|e| Error::io_with_path(&e, &link))?;
    }
    Ok(())
}

#[cfg(unix)]
async fn link_path(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(not(unix))]
async fn link_path(target: &Path, link: &Path) -> std::io::Result<()> {
    if fs::metadata(target).await?.is_dir() {
        copy_dir_contents(target, link)
            .await
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    } else {
        fs::copy(target, link).await.map(|_| ())
    }
}
