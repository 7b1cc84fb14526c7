//! Output path conventions

use apkpipe_types::BuildTarget;
use std::path::{Path, PathBuf};

/// Path inside the package holding `metadata.txt` and the secondary dex jars.
pub const SECONDARY_DEX_SUBDIR: &str = "assets/secondary-program-dex-jars";

/// Largest entry a legacy installer will inflate.
pub const FROYO_DEFLATE_LIMIT_BYTES: u64 = 1 << 20;

/// Resolves `gen/` and `bin/` paths for a target under one output root.
///
/// Patterns use `%s` for the target's short name, so
/// `bin_path(t, "__%s_split_zip__")` for `//apps/sample:app` is
/// `<out>/bin/apps/sample/__app_split_zip__`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    out_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    #[must_use]
    pub fn gen_path(&self, target: &BuildTarget, pattern: &str) -> PathBuf {
        self.scoped("gen", target, pattern)
    }

    #[must_use]
    pub fn bin_path(&self, target: &BuildTarget, pattern: &str) -> PathBuf {
        self.scoped("bin", target, pattern)
    }

    fn scoped(&self, kind: &str, target: &BuildTarget, pattern: &str) -> PathBuf {
        let mut path = self.out_dir.join(kind);
        if !target.base_path().is_empty() {
            path.push(target.base_path_dir());
        }
        path.join(pattern.replace("%s", target.short_name()))
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new("buck-out")
    }
}

/// Replace the `.unsigned.apk` suffix of `unsigned` with `suffix`.
#[must_use]
pub fn with_apk_suffix(unsigned: &Path, suffix: &str) -> PathBuf {
    let text = unsigned.to_string_lossy();
    match text.strip_suffix(".unsigned.apk") {
        Some(stem) => PathBuf::from(format!("{stem}{suffix}")),
        None => unsigned.to_path_buf(),
    }
}
