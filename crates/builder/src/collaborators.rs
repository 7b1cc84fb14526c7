//! Rules the packaging pipeline depends on but does not own

use crate::closure::DependencyCollector;
use apkpipe_errors::Error;
use apkpipe_hash::Hash;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Outputs of the resource packaging step that runs before this pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagedResources {
    /// Compiled resources archive produced by aapt
    pub resource_apk: PathBuf,
    /// Merged `AndroidManifest.xml`
    pub android_manifest: PathBuf,
    /// Non-default-locale strings packed as assets, when enabled
    #[serde(default)]
    pub string_assets_zip: Option<PathBuf>,
}

/// Dex merge of pre-dexed libraries.
pub trait PreDexMerge: Send + Sync {
    /// Directories holding secondary dex jars and `metadata.txt`, each
    /// zipped into the package
    fn secondary_dex_directories(&self) -> Vec<PathBuf>;

    fn metadata_txt_path(&self) -> PathBuf;

    /// Directory of secondary dex files installed outside the package
    fn dex_directory(&self) -> PathBuf;
}

/// Computes the ABI hash of everything an exopackage binary depends on.
#[async_trait]
pub trait ComputeDepsAbi: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if an input cannot be read.
    async fn android_binary_abi_hash(&self) -> Result<Hash, Error>;
}

/// Constructor-injected collaborators of a packaging rule.
#[derive(Clone)]
pub struct Collaborators {
    pub collector: Arc<dyn DependencyCollector>,
    pub resources: PackagedResources,
    pub pre_dex_merge: Option<Arc<dyn PreDexMerge>>,
    pub deps_abi: Option<Arc<dyn ComputeDepsAbi>>,
}

impl Collaborators {
    #[must_use]
    pub fn new(collector: Arc<dyn DependencyCollector>, resources: PackagedResources) -> Self {
        Self {
            collector,
            resources,
            pre_dex_merge: None,
            deps_abi: None,
        }
    }

    #[must_use]
    pub fn with_pre_dex_merge(mut self, merge: Arc<dyn PreDexMerge>) -> Self {
        self.pre_dex_merge = Some(merge);
        self
    }

    #[must_use]
    pub fn with_deps_abi(mut self, abi: Arc<dyn ComputeDepsAbi>) -> Self {
        self.deps_abi = Some(abi);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("resources", &self.resources)
            .field("pre_dex_merge", &self.pre_dex_merge.is_some())
            .field("deps_abi", &self.deps_abi.is_some())
            .finish_non_exhaustive()
    }
}

/// Pre-dex merge whose outputs are known up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPreDexMerge {
    #[serde(default)]
    pub secondary_dex_directories: Vec<PathBuf>,
    pub metadata_txt: PathBuf,
    pub dex_directory: PathBuf,
}

impl PreDexMerge for StaticPreDexMerge {
    fn secondary_dex_directories(&self) -> Vec<PathBuf> {
        self.secondary_dex_directories.clone()
    }

    fn metadata_txt_path(&self) -> PathBuf {
        self.metadata_txt.clone()
    }

    fn dex_directory(&self) -> PathBuf {
        self.dex_directory.clone()
    }
}
