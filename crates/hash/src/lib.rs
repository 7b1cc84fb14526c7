#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! BLAKE3 hashing for apkpipe
//!
//! Content hashes feed the rule key that decides whether the packaging
//! pipeline can be skipped, and the dependency ABI hash used when
//! exopackage is enabled.

mod rule_key;

pub use rule_key::RuleKeyBuilder;

use apkpipe_errors::{BuildError, Error};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// A BLAKE3 hash value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash {
    bytes: [u8; 32],
}

impl Hash {
    /// Create a hash from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns an error if the input is not 64 hexadecimal characters.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| Error::internal(format!("invalid hex: {e}")))?;

        let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            Error::internal(format!("hash must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Compute hash of a byte slice
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self::from_bytes(*hash.as_bytes())
    }

    /// Compute hash of a file
    ///
    /// # Errors
    /// Returns an error if the file does not exist or cannot be read.
    pub async fn hash_file(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BuildError::MissingInput {
                    path: path.display().to_string(),
                }
                .into()
            } else {
                Error::io_with_path(&e, path)
            }
        })?;

        let mut hasher = Hasher::new();
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self::from_bytes(*hasher.finalize().as_bytes()))
    }

    /// Hash a file or a directory tree.
    ///
    /// Directories are walked in file-name order; every regular file
    /// contributes its relative path and its contents, so the result is
    /// stable across machines.
    ///
    /// # Errors
    /// Returns an error if the path does not exist or any entry cannot be read.
    pub async fn hash_path(path: &Path) -> Result<Self, Error> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || hash_path_blocking(&path))
            .await
            .map_err(|e| BuildError::TaskFailed {
                message: e.to_string(),
            })?
    }
}

fn hash_path_blocking(root: &Path) -> Result<Hash, Error> {
    if !root.exists() {
        return Err(BuildError::MissingInput {
            path: root.display().to_string(),
        }
        .into());
    }

    let mut hasher = Hasher::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
            match e.into_io_error() {
                Some(io) => Error::io_with_path(&io, path),
                None => Error::internal(format!("filesystem loop at {}", path.display())),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative: PathBuf = entry
            .path()
            .strip_prefix(root)
            .map_or_else(|_| entry.path().to_path_buf(), Path::to_path_buf);
        let name = relative.to_string_lossy();
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());

        let mut file =
            std::fs::File::open(entry.path()).map_err(|e| Error::io_with_path(&e, entry.path()))?;
        let mut contents = Hasher::new();
        std::io::copy(&mut file, &mut contents).map_err(|e| Error::io_with_path(&e, entry.path()))?;
        hasher.update(contents.finalize().as_bytes());
    }
    Ok(Hash::from_bytes(*hasher.finalize().as_bytes()))
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_basics() {
        let hash = Hash::from_data(b"hello world");

        // Known BLAKE3 hash of "hello world"
        let expected = "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24";
        assert_eq!(hash.to_hex(), expected);
    }

    #[test]
    fn test_hash_serialization() {
        let hash = Hash::from_data(b"test");
        let json = serde_json::to_string(&hash).unwrap();
        let deserialized: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, deserialized);
    }

    #[tokio::test]
    async fn test_hash_file() {
        use std::io::Write;
        let mut temp = NamedTempFile::new().unwrap();
        let data = b"test file content";
        temp.write_all(data).unwrap();

        let hash = Hash::hash_file(temp.path()).await.unwrap();
        assert_eq!(hash, Hash::from_data(data));
    }

    #[tokio::test]
    async fn test_hash_file_missing_is_missing_input() {
        let err = Hash::hash_file(Path::new("/definitely/not/here.jar"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::MissingInput { .. })
        ));
    }
}
