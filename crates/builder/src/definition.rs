//! TOML description of one binary target and its resolved inputs
//!
//! ```toml
//! [binary]
//! target = "//apps/sample:app"
//! manifest = "apps/sample/AndroidManifest.xml"
//! platform_target = "android-16"
//! package_type = "release"
//! cpu_filters = ["arm", "x86"]
//!
//! [binary.keystore]
//! target = "//keystores:debug"
//! store = "keystores/debug.keystore"
//! properties = "keystores/debug.keystore.properties"
//!
//! [closure]
//! classpath_entries_to_dex = ["buck-out/gen/java/lib__lib__output/lib.jar"]
//!
//! [resources]
//! resource_apk = "buck-out/gen/apps/sample/app.resources.apk"
//! android_manifest = "buck-out/gen/apps/sample/AndroidManifest.xml"
//! ```

use crate::cache_key::ContentAbiCalculator;
use crate::closure::{DependencyClosure, StaticCollector};
use crate::collaborators::{Collaborators, PackagedResources, StaticPreDexMerge};
use crate::configuration::{ExcludedLibrary, Keystore, ObfuscationSettings, PackagingConfiguration};
use crate::layout::OutputLayout;
use crate::pipeline::PackagingRule;
use apkpipe_errors::Error;
use apkpipe_types::{BuildTarget, DexSplitMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySection {
    pub target: BuildTarget,
    pub manifest: PathBuf,
    pub platform_target: String,
    pub keystore: Keystore,
    #[serde(default)]
    pub package_type: Option<String>,
    #[serde(default)]
    pub classpath_deps: Vec<BuildTarget>,
    #[serde(default)]
    pub cpu_filters: Vec<String>,
    #[serde(default)]
    pub resource_compression: Option<String>,
    #[serde(default)]
    pub exopackage: bool,
    #[serde(default)]
    pub disable_pre_dex: bool,
    #[serde(default)]
    pub dex_split: DexSplitMode,
    #[serde(default)]
    pub obfuscation: ObfuscationSettings,
    #[serde(default)]
    pub preprocess_command: Option<String>,
    #[serde(default)]
    pub preprocess_deps: Vec<BuildTarget>,
    #[serde(default)]
    pub no_dx: Vec<ExcludedLibrary>,
}

/// A binary target together with everything its graph already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryDefinition {
    pub binary: BinarySection,
    #[serde(default)]
    pub closure: DependencyClosure,
    pub resources: PackagedResources,
    #[serde(default)]
    pub pre_dex: Option<StaticPreDexMerge>,
}

impl BinaryDefinition {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        Self::parse(&text)
    }

    /// # Errors
    ///
    /// Returns an error if `text` is not a valid definition.
    pub fn parse(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Validate the binary section into a packaging configuration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error.
    pub fn configuration(&self) -> Result<PackagingConfiguration, Error> {
        let section = &self.binary;
        let mut builder = PackagingConfiguration::builder(section.target.clone())
            .manifest(section.manifest.clone())
            .platform_target(section.platform_target.clone())
            .keystore(section.keystore.clone())
            .package_type(section.package_type.as_deref())?
            .exopackage(section.exopackage)
            .disable_pre_dex(section.disable_pre_dex)
            .dex_split_mode(section.dex_split.clone())
            .obfuscation(section.obfuscation.clone());

        for dep in &section.classpath_deps {
            builder = builder.classpath_dep(dep.clone());
        }
        for cpu in &section.cpu_filters {
            builder = builder.cpu_filter(cpu)?;
        }
        if let Some(mode) = &section.resource_compression {
            builder = builder.resource_compression_mode(mode)?;
        }
        if let Some(command) = &section.preprocess_command {
            builder = builder.preprocess_command(command.clone());
        }
        for dep in &section.preprocess_deps {
            builder = builder.preprocess_dep(dep.clone());
        }
        for library in &section.no_dx {
            builder = builder.exclude_from_dex(library.clone());
        }
        builder.build()
    }

    /// Build the packaging rule with static collaborators.
    ///
    /// Exopackage builds get a [`ContentAbiCalculator`] over the closure,
    /// the resource archive and the keystore files.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from validation or plan resolution.
    pub fn into_rule(self, project_root: &Path, layout: OutputLayout) -> Result<PackagingRule, Error> {
        let config = self.configuration()?;
        let collector = Arc::new(StaticCollector::new(self.closure));
        let packaged = [
            Some(self.resources.resource_apk.clone()),
            self.resources.string_assets_zip.clone(),
            Some(config.keystore().store.clone()),
            Some(config.keystore().properties.clone()),
        ];
        let mut collaborators = Collaborators::new(collector.clone(), self.resources);
        if let Some(merge) = self.pre_dex {
            collaborators = collaborators.with_pre_dex_merge(Arc::new(merge));
        }
        if config.is_exopackage() {
            let calculator = ContentAbiCalculator::new(project_root, collector)
                .with_inputs(packaged.into_iter().flatten());
            collaborators = collaborators.with_deps_abi(Arc::new(calculator));
        }
        PackagingRule::new(config, collaborators, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkpipe_types::PackageType;

    const SAMPLE: &str = r#"
[binary]
target = "//apps/sample:app"
manifest = "apps/sample/AndroidManifest.xml"
platform_target = "android-16"
package_type = "Release"
cpu_filters = ["x86", "arm"]
resource_compression = "enabled"

[binary.keystore]
target = "//keystores:debug"
store = "keystores/debug.keystore"
properties = "keystores/debug.keystore.properties"

[binary.dex_split]
should_split_dex = true

[closure]
classpath_entries_to_dex = ["java/lib.jar"]

[resources]
resource_apk = "gen/app.resources.apk"
android_manifest = "gen/AndroidManifest.xml"
"#;

    #[test]
    fn test_parse_sample_definition() {
        let definition = BinaryDefinition::parse(SAMPLE).unwrap();
        let config = definition.configuration().unwrap();
        assert_eq!(config.package_type(), PackageType::Release);
        assert_eq!(config.cpu_filters().len(), 2);
        assert!(config.dex_split_mode().should_split_dex);
        assert!(config.resource_compression().is_compress_resources());
    }

    #[test]
    fn test_invalid_cpu_filter_names_target_and_value() {
        let text = SAMPLE.replace(r#"["x86", "arm"]"#, r#"["sparc"]"#);
        let err = BinaryDefinition::parse(&text).unwrap().configuration().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("//apps/sample:app"));
        assert!(message.contains("sparc"));
    }

    #[test]
    fn test_exopackage_definition_gets_abi_calculator() {
        let text = SAMPLE
            .replace("package_type = \"Release\"", "package_type = \"debug\"\nexopackage = true")
            + "\n[pre_dex]\nmetadata_txt = \"pre/metadata.txt\"\ndex_directory = \"pre/dex\"\n";
        let rule = BinaryDefinition::parse(&text)
            .unwrap()
            .into_rule(Path::new("/project"), OutputLayout::default())
            .unwrap();
        assert!(rule.exopackage_info().is_some());
    }
}
