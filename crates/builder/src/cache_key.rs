//! Rule keys and the incremental cache-key selector

use crate::actions::resolve;
use crate::closure::DependencyCollector;
use crate::collaborators::ComputeDepsAbi;
use crate::pipeline::PackagingRule;
use apkpipe_errors::{ConfigError, Error};
use apkpipe_hash::{Hash, RuleKeyBuilder};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const RULE_TYPE: &str = "android_binary";

/// Key deciding whether the packaging pipeline may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "hash", rename_all = "snake_case")]
pub enum CacheKey {
    /// Full structural key of the rule and its inputs
    RuleKey(Hash),
    /// ABI of the dependencies, used for exopackage builds
    DepsAbi(Hash),
}

impl CacheKey {
    #[must_use]
    pub fn hash(&self) -> &Hash {
        match self {
            Self::RuleKey(hash) | Self::DepsAbi(hash) => hash,
        }
    }
}

impl PackagingRule {
    /// Hash every configuration field plus the contents of everything the
    /// package is built from.
    ///
    /// Files in [`PackagingRule::inputs_to_compare`] must exist. Closure
    /// entries and [`PackagingRule::packaged_inputs`] that are missing are
    /// recorded as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the closure cannot be resolved or an input file
    /// cannot be read.
    pub async fn rule_key(&self, project_root: &Path) -> Result<Hash, Error> {
        let config = self.config();
        let obfuscation = config.obfuscation();
        let split = config.dex_split_mode();

        let mut builder = RuleKeyBuilder::new(RULE_TYPE)
            .set_str("target", &config.target().fully_qualified_name())
            .set_str("platform_target", config.platform_target())
            .set_str("keystore", &config.keystore().target.fully_qualified_name())
            .set_strings(
                "classpath_deps",
                config.classpath_deps().iter().map(|dep| dep.fully_qualified_name()),
            )
            .set_str("package_type", config.package_type().as_str())
            .set_bool(
                "use_android_proguard_config_with_optimizations",
                obfuscation.use_android_config_with_optimizations,
            )
            .set_opt_str(
                "optimization_passes",
                obfuscation.optimization_passes.map(|n| n.to_string()).as_deref(),
            )
            .set_str("resource_compression", config.resource_compression().as_str())
            .set_strings("cpu_filters", config.cpu_filters().iter().map(|cpu| cpu.as_str()))
            .set_bool("exopackage", config.is_exopackage())
            .set_bool("disable_pre_dex", config.is_pre_dex_disabled())
            .set_opt_str(
                "preprocess_java_classes_bash",
                config.preprocess().map(|hook| hook.command.as_str()),
            )
            .set_strings(
                "preprocess_java_classes_deps",
                config
                    .preprocess()
                    .into_iter()
                    .flat_map(|hook| hook.deps.iter().map(|dep| dep.fully_qualified_name())),
            );

        for library in config.excluded_from_dex() {
            builder = builder
                .set_str("excluded_library", &library.target.fully_qualified_name())
                .set_strings(
                    "excluded_library_classpath",
                    library.classpath_entries.iter().map(|p| p.to_string_lossy()),
                )
                .set_opt_str("excluded_library_abi", library.abi_key.as_deref());
        }

        builder = builder
            .set_bool("should_split_dex", split.should_split_dex)
            .set_str("dex_split_strategy", split.dex_split_strategy.as_str())
            .set_str("dex_store", split.dex_store.as_str())
            .set_bool("use_linear_alloc_split_dex", split.use_linear_alloc_split_dex)
            .set_u64("linear_alloc_hard_limit", split.linear_alloc_hard_limit)
            .set_strings("primary_dex_patterns", &split.primary_dex_patterns)
            .set_bool(
                "primary_dex_scenario_overflow_allowed",
                split.is_primary_dex_scenario_overflow_allowed,
            );

        for input in self.inputs_to_compare() {
            let hash = Hash::hash_file(&resolve(project_root, &input)).await?;
            builder = builder
                .set_str("input", &input.to_string_lossy())
                .set_hash("input_contents", &hash);
        }

        let closure = self.collaborators().collector.dependency_closure()?;
        builder = hash_contents(builder, project_root, closure.content_paths()).await?;
        builder = hash_contents(builder, project_root, &self.packaged_inputs()).await?;

        Ok(builder.build())
    }

    /// The rule key, or the deps ABI hash when exopackage is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails or the deps ABI calculator is missing.
    pub async fn abi_key_for_deps(&self, project_root: &Path) -> Result<CacheKey, Error> {
        if !self.config().is_exopackage() {
            return Ok(CacheKey::RuleKey(self.rule_key(project_root).await?));
        }
        let calculator = self.collaborators().deps_abi.as_ref().ok_or_else(|| {
            Error::from(ConfigError::MissingCollaborator {
                target: self.config().target().to_string(),
                collaborator: "deps ABI calculator".to_string(),
            })
        })?;
        Ok(CacheKey::DepsAbi(calculator.android_binary_abi_hash().await?))
    }
}

/// Fold the contents of `paths` into `builder`, one field per path.
///
/// A path that does not exist is recorded as absent.
async fn hash_contents<'a, I>(
    mut builder: RuleKeyBuilder,
    project_root: &Path,
    paths: I,
) -> Result<RuleKeyBuilder, Error>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    for path in paths {
        let absolute = resolve(project_root, path);
        let name = path.to_string_lossy();
        builder = if tokio::fs::try_exists(&absolute).await? {
            builder.set_hash(&name, &Hash::hash_path(&absolute).await?)
        } else {
            builder.set_opt_str(&name, None)
        };
    }
    Ok(builder)
}

/// Deps ABI calculator hashing the contents of the dependency closure plus
/// any extra packaged inputs (resource archive, keystore).
///
/// Paths that do not exist are recorded as absent rather than failing.
#[derive(Clone)]
pub struct ContentAbiCalculator {
    project_root: PathBuf,
    collector: Arc<dyn DependencyCollector>,
    extra_inputs: Vec<PathBuf>,
}

impl ContentAbiCalculator {
    pub fn new(project_root: impl Into<PathBuf>, collector: Arc<dyn DependencyCollector>) -> Self {
        Self {
            project_root: project_root.into(),
            collector,
            extra_inputs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.extra_inputs.extend(inputs);
        self
    }
}

impl std::fmt::Debug for ContentAbiCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentAbiCalculator")
            .field("project_root", &self.project_root)
            .field("extra_inputs", &self.extra_inputs)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ComputeDepsAbi for ContentAbiCalculator {
    async fn android_binary_abi_hash(&self) -> Result<Hash, Error> {
        let closure = self.collector.dependency_closure()?;
        let builder = RuleKeyBuilder::new("android_binary_deps_abi");
        let builder = hash_contents(builder, &self.project_root, closure.content_paths()).await?;
        let builder = hash_contents(builder, &self.project_root, &self.extra_inputs).await?;
        Ok(builder.build())
    }
}
