//! Dependency closure consumed by the packaging pipeline

use apkpipe_errors::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Flattened transitive outputs of a binary's dependencies.
///
/// Every list keeps first-seen order and holds no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyClosure {
    pub classpath_entries_to_dex: Vec<PathBuf>,
    pub resource_dirs: Vec<PathBuf>,
    pub native_lib_dirs: Vec<PathBuf>,
    pub proguard_configs: Vec<PathBuf>,
    pub third_party_jars: Vec<PathBuf>,
}

impl DependencyClosure {
    /// Drop repeated entries, keeping the first occurrence.
    #[must_use]
    pub fn deduplicated(mut self) -> Self {
        for list in [
            &mut self.classpath_entries_to_dex,
            &mut self.resource_dirs,
            &mut self.native_lib_dirs,
            &mut self.proguard_configs,
            &mut self.third_party_jars,
        ] {
            dedup_in_order(list);
        }
        self
    }

    /// Every path whose contents the package depends on.
    pub fn content_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.classpath_entries_to_dex
            .iter()
            .chain(&self.resource_dirs)
            .chain(&self.native_lib_dirs)
            .chain(&self.proguard_configs)
            .chain(&self.third_party_jars)
    }
}

fn dedup_in_order(list: &mut Vec<PathBuf>) {
    let mut seen = std::collections::HashSet::new();
    list.retain(|path| seen.insert(path.clone()));
}

/// Walks the dependency graph of a binary.
pub trait DependencyCollector: Send + Sync {
    /// Resolve the closure for one invocation of the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be walked.
    fn dependency_closure(&self) -> Result<DependencyClosure, Error>;
}

/// Collector over an already resolved closure.
#[derive(Debug, Clone, Default)]
pub struct StaticCollector {
    closure: DependencyClosure,
}

impl StaticCollector {
    #[must_use]
    pub fn new(closure: DependencyClosure) -> Self {
        Self { closure }
    }
}

impl DependencyCollector for StaticCollector {
    fn dependency_closure(&self) -> Result<DependencyClosure, Error> {
        Ok(self.closure.clone().deduplicated())
    }
}
