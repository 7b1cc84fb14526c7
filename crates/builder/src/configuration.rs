//! Immutable packaging configuration and its validating builder

use apkpipe_errors::{ConfigError, Error};
use apkpipe_types::{BuildTarget, DexSplitMode, PackageType, ResourceCompressionMode, TargetCpuType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Signing material for the final package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystore {
    pub target: BuildTarget,
    pub store: PathBuf,
    /// Java properties file holding `key.store.password`, `key.alias`
    /// and `key.alias.password`
    pub properties: PathBuf,
}

/// A library whose classes must stay out of the dex files.
///
/// Its classpath entries still reach the obfuscator as library jars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedLibrary {
    pub target: BuildTarget,
    #[serde(default)]
    pub classpath_entries: Vec<PathBuf>,
    /// ABI key of the library's public interface, when known
    #[serde(default)]
    pub abi_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObfuscationSettings {
    #[serde(default)]
    pub use_android_config_with_optimizations: bool,
    #[serde(default)]
    pub optimization_passes: Option<u32>,
    /// Project level proguard config
    #[serde(default)]
    pub project_config: Option<PathBuf>,
}

/// Shell command run over the classpath before obfuscation and dexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessHook {
    pub command: String,
    #[serde(default)]
    pub deps: Vec<BuildTarget>,
}

/// Everything that decides which actions the packaging pipeline runs.
#[derive(Debug, Clone)]
pub struct PackagingConfiguration {
    target: BuildTarget,
    manifest: PathBuf,
    platform_target: String,
    keystore: Keystore,
    classpath_deps: Vec<BuildTarget>,
    package_type: PackageType,
    excluded_from_dex: Vec<ExcludedLibrary>,
    disable_pre_dex: bool,
    exopackage: bool,
    dex_split_mode: DexSplitMode,
    obfuscation: ObfuscationSettings,
    resource_compression: ResourceCompressionMode,
    cpu_filters: BTreeSet<TargetCpuType>,
    preprocess: Option<PreprocessHook>,
}

impl PackagingConfiguration {
    #[must_use]
    pub fn builder(target: BuildTarget) -> PackagingConfigurationBuilder {
        PackagingConfigurationBuilder::new(target)
    }

    #[must_use]
    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    #[must_use]
    pub fn manifest(&self) -> &PathBuf {
        &self.manifest
    }

    /// Android platform target, e.g. `Google Inc.:Google APIs:16`
    #[must_use]
    pub fn platform_target(&self) -> &str {
        &self.platform_target
    }

    #[must_use]
    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    #[must_use]
    pub fn classpath_deps(&self) -> &[BuildTarget] {
        &self.classpath_deps
    }

    #[must_use]
    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    #[must_use]
    pub fn excluded_from_dex(&self) -> &[ExcludedLibrary] {
        &self.excluded_from_dex
    }

    #[must_use]
    pub fn is_exopackage(&self) -> bool {
        self.exopackage
    }

    #[must_use]
    pub fn dex_split_mode(&self) -> &DexSplitMode {
        &self.dex_split_mode
    }

    #[must_use]
    pub fn obfuscation(&self) -> &ObfuscationSettings {
        &self.obfuscation
    }

    #[must_use]
    pub fn resource_compression(&self) -> ResourceCompressionMode {
        self.resource_compression
    }

    #[must_use]
    pub fn cpu_filters(&self) -> &BTreeSet<TargetCpuType> {
        &self.cpu_filters
    }

    #[must_use]
    pub fn preprocess(&self) -> Option<&PreprocessHook> {
        self.preprocess.as_ref()
    }

    #[must_use]
    pub fn is_release(&self) -> bool {
        self.package_type == PackageType::Release
    }

    #[must_use]
    pub fn is_pre_dex_disabled(&self) -> bool {
        self.disable_pre_dex
    }

    /// Pre-dexing applies to plain debug builds only.
    #[must_use]
    pub fn should_pre_dex(&self) -> bool {
        !self.disable_pre_dex && self.package_type == PackageType::Debug && self.preprocess.is_none()
    }
}

/// Collects configuration values, rejecting invalid ones as they arrive.
#[derive(Debug, Clone)]
pub struct PackagingConfigurationBuilder {
    target: BuildTarget,
    manifest: Option<PathBuf>,
    platform_target: Option<String>,
    keystore: Option<Keystore>,
    classpath_deps: Vec<BuildTarget>,
    package_type: PackageType,
    excluded_from_dex: Vec<ExcludedLibrary>,
    disable_pre_dex: bool,
    exopackage: bool,
    dex_split_mode: DexSplitMode,
    obfuscation: ObfuscationSettings,
    resource_compression: ResourceCompressionMode,
    cpu_filters: BTreeSet<TargetCpuType>,
    preprocess_command: Option<String>,
    preprocess_deps: Vec<BuildTarget>,
}

impl PackagingConfigurationBuilder {
    #[must_use]
    pub fn new(target: BuildTarget) -> Self {
        Self {
            target,
            manifest: None,
            platform_target: None,
            keystore: None,
            classpath_deps: Vec::new(),
            package_type: PackageType::default(),
            excluded_from_dex: Vec::new(),
            disable_pre_dex: false,
            exopackage: false,
            dex_split_mode: DexSplitMode::no_split(),
            obfuscation: ObfuscationSettings::default(),
            resource_compression: ResourceCompressionMode::default(),
            cpu_filters: BTreeSet::new(),
            preprocess_command: None,
            preprocess_deps: Vec::new(),
        }
    }

    #[must_use]
    pub fn manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = Some(manifest.into());
        self
    }

    #[must_use]
    pub fn platform_target(mut self, platform_target: impl Into<String>) -> Self {
        self.platform_target = Some(platform_target.into());
        self
    }

    #[must_use]
    pub fn keystore(mut self, keystore: Keystore) -> Self {
        self.keystore = Some(keystore);
        self
    }

    #[must_use]
    pub fn classpath_dep(mut self, dep: BuildTarget) -> Self {
        if !self.classpath_deps.contains(&dep) {
            self.classpath_deps.push(dep);
        }
        self
    }

    /// Set the package type by name; `None` selects debug.
    ///
    /// # Errors
    ///
    /// Returns an error naming the target if the value is not a known type.
    pub fn package_type(mut self, value: Option<&str>) -> Result<Self, Error> {
        self.package_type = match value {
            None => PackageType::default(),
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPackageType {
                target: self.target.to_string(),
                value: value.to_string(),
            })?,
        };
        Ok(self)
    }

    #[must_use]
    pub fn exclude_from_dex(mut self, library: ExcludedLibrary) -> Self {
        self.excluded_from_dex.push(library);
        self
    }

    #[must_use]
    pub fn disable_pre_dex(mut self, disable: bool) -> Self {
        self.disable_pre_dex = disable;
        self
    }

    #[must_use]
    pub fn exopackage(mut self, exopackage: bool) -> Self {
        self.exopackage = exopackage;
        self
    }

    #[must_use]
    pub fn dex_split_mode(mut self, mode: DexSplitMode) -> Self {
        self.dex_split_mode = mode;
        self
    }

    #[must_use]
    pub fn obfuscation(mut self, settings: ObfuscationSettings) -> Self {
        self.obfuscation = settings;
        self
    }

    /// # Errors
    ///
    /// Returns an error naming the target if the mode is not recognised.
    pub fn resource_compression_mode(mut self, value: &str) -> Result<Self, Error> {
        self.resource_compression =
            value
                .parse()
                .map_err(|_| ConfigError::InvalidCompressionMode {
                    target: self.target.to_string(),
                    value: value.to_string(),
                })?;
        Ok(self)
    }

    /// Add a CPU filter by name (`arm`, `armv7`, `x86`, `mips`).
    ///
    /// # Errors
    ///
    /// Returns an error if the name has no ABI directory.
    pub fn cpu_filter(mut self, value: &str) -> Result<Self, Error> {
        let cpu: TargetCpuType = value.parse().map_err(|_| ConfigError::InvalidCpuFilter {
            target: self.target.to_string(),
            value: value.to_string(),
        })?;
        self.cpu_filters.insert(cpu);
        Ok(self)
    }

    #[must_use]
    pub fn preprocess_command(mut self, command: impl Into<String>) -> Self {
        self.preprocess_command = Some(command.into());
        self
    }

    #[must_use]
    pub fn preprocess_dep(mut self, dep: BuildTarget) -> Self {
        self.preprocess_deps.push(dep);
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or exopackage is
    /// requested for a build that is not pre-dexed.
    pub fn build(self) -> Result<PackagingConfiguration, Error> {
        let manifest = self.manifest.ok_or_else(|| ConfigError::MissingField {
            field: "manifest".to_string(),
        })?;
        let platform_target = self.platform_target.ok_or_else(|| ConfigError::MissingField {
            field: "platform_target".to_string(),
        })?;
        let keystore = self.keystore.ok_or_else(|| ConfigError::MissingField {
            field: "keystore".to_string(),
        })?;

        let preprocess = self.preprocess_command.map(|command| PreprocessHook {
            command,
            deps: self.preprocess_deps,
        });

        let config = PackagingConfiguration {
            target: self.target,
            manifest,
            platform_target,
            keystore,
            classpath_deps: self.classpath_deps,
            package_type: self.package_type,
            excluded_from_dex: self.excluded_from_dex,
            disable_pre_dex: self.disable_pre_dex,
            exopackage: self.exopackage,
            dex_split_mode: self.dex_split_mode,
            obfuscation: self.obfuscation,
            resource_compression: self.resource_compression,
            cpu_filters: self.cpu_filters,
            preprocess,
        };

        if config.exopackage && !config.should_pre_dex() {
            return Err(ConfigError::ExopackageWithoutPreDex {
                target: config.target.to_string(),
            }
            .into());
        }

        Ok(config)
    }
}
