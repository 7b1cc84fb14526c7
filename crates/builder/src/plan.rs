//! Pipeline plan resolved once from the configuration

use crate::collaborators::PreDexMerge;
use crate::configuration::{ObfuscationSettings, PackagingConfiguration, PreprocessHook};
use apkpipe_errors::{ConfigError, Error};
use apkpipe_types::DexSplitMode;
use serde::Serialize;
use std::path::PathBuf;

/// How the class set turns into dex files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DexPlan {
    /// One dex action over the whole class set
    Unsplit,
    /// Split into a primary and numbered secondary units
    Split(DexSplitMode),
    /// Secondary dex directories come from the pre-dex merge
    PreDexed {
        secondary_dex_directories: Vec<PathBuf>,
    },
    /// Secondary dexes are installed outside the package
    Exopackage,
}

impl DexPlan {
    /// True when this pipeline runs the dexer itself.
    #[must_use]
    pub fn dexes_here(&self) -> bool {
        matches!(self, Self::Unsplit | Self::Split(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObfuscationPlan {
    pub settings: ObfuscationSettings,
    /// Classpath entries of libraries excluded from dex
    pub library_jars: Vec<PathBuf>,
}

/// Which stages run, decided once per rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelinePlan {
    pub preprocess: Option<PreprocessHook>,
    pub obfuscation: Option<ObfuscationPlan>,
    pub dex: DexPlan,
    pub optimize_dex: bool,
    pub compress_resources: bool,
}

impl PipelinePlan {
    /// Resolve the plan for a configuration.
    ///
    /// A pre-dex merge is only consulted when the configuration pre-dexes.
    ///
    /// # Errors
    ///
    /// Returns an error if exopackage is enabled without a pre-dex merge.
    pub fn resolve(
        config: &PackagingConfiguration,
        pre_dex_merge: Option<&dyn PreDexMerge>,
    ) -> Result<Self, Error> {
        let obfuscation = config
            .package_type()
            .is_build_with_obfuscation()
            .then(|| ObfuscationPlan {
                settings: config.obfuscation().clone(),
                library_jars: config
                    .excluded_from_dex()
                    .iter()
                    .flat_map(|lib| lib.classpath_entries.iter().cloned())
                    .collect(),
            });

        let merge = pre_dex_merge.filter(|_| config.should_pre_dex());
        let dex = match (merge, config.is_exopackage()) {
            (Some(_), true) => DexPlan::Exopackage,
            (Some(merge), false) => DexPlan::PreDexed {
                secondary_dex_directories: merge.secondary_dex_directories(),
            },
            (None, true) => {
                return Err(ConfigError::MissingCollaborator {
                    target: config.target().to_string(),
                    collaborator: "pre-dex merge".to_string(),
                }
                .into())
            }
            (None, false) if config.dex_split_mode().should_split_dex => {
                DexPlan::Split(config.dex_split_mode().clone())
            }
            (None, false) => DexPlan::Unsplit,
        };

        Ok(Self {
            preprocess: config.preprocess().cloned(),
            obfuscation,
            dex,
            optimize_dex: config.is_release(),
            compress_resources: config.resource_compression().is_compress_resources(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StaticPreDexMerge;
    use crate::configuration::{ExcludedLibrary, Keystore};
    use apkpipe_types::BuildTarget;

    fn builder() -> crate::configuration::PackagingConfigurationBuilder {
        PackagingConfiguration::builder(BuildTarget::new("apps/sample", "app"))
            .manifest("AndroidManifest.xml")
            .platform_target("android-16")
            .keystore(Keystore {
                target: BuildTarget::new("keystores", "debug"),
                store: PathBuf::from("debug.keystore"),
                properties: PathBuf::from("debug.keystore.properties"),
            })
    }

    fn merge() -> StaticPreDexMerge {
        StaticPreDexMerge {
            secondary_dex_directories: vec![PathBuf::from("buck-out/bin/__app_pre_dex__")],
            metadata_txt: PathBuf::from("buck-out/bin/__app_pre_dex__/metadata.txt"),
            dex_directory: PathBuf::from("buck-out/bin/__app_pre_dex__/dex"),
        }
    }

    #[test]
    fn test_debug_without_split_is_unsplit() {
        let config = builder().build().unwrap();
        let plan = PipelinePlan::resolve(&config, None).unwrap();
        assert_eq!(plan.dex, DexPlan::Unsplit);
        assert!(plan.obfuscation.is_none());
        assert!(!plan.optimize_dex);
    }

    #[test]
    fn test_release_obfuscates_with_excluded_jars() {
        let config = builder()
            .package_type(Some("release"))
            .unwrap()
            .exclude_from_dex(ExcludedLibrary {
                target: BuildTarget::new("third-party", "guava"),
                classpath_entries: vec![PathBuf::from("third-party/guava.jar")],
                abi_key: None,
            })
            .build()
            .unwrap();
        let plan = PipelinePlan::resolve(&config, Some(&merge())).unwrap();
        let obfuscation = plan.obfuscation.unwrap();
        assert_eq!(obfuscation.library_jars, vec![PathBuf::from("third-party/guava.jar")]);
        // Release never pre-dexes, so the merge is ignored
        assert_eq!(plan.dex, DexPlan::Unsplit);
        assert!(plan.optimize_dex);
    }

    #[test]
    fn test_pre_dex_merge_supplies_secondary_dirs() {
        let config = builder().build().unwrap();
        let plan = PipelinePlan::resolve(&config, Some(&merge())).unwrap();
        assert_eq!(
            plan.dex,
            DexPlan::PreDexed {
                secondary_dex_directories: vec![PathBuf::from("buck-out/bin/__app_pre_dex__")]
            }
        );
        assert!(!plan.dex.dexes_here());
    }

    #[test]
    fn test_exopackage_plan() {
        let config = builder().exopackage(true).build().unwrap();
        let plan = PipelinePlan::resolve(&config, Some(&merge())).unwrap();
        assert_eq!(plan.dex, DexPlan::Exopackage);

        let err = PipelinePlan::resolve(&config, None).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_compression_modes_select_repack() {
        let config = builder()
            .resource_compression_mode("enabled_with_strings_as_assets")
            .unwrap()
            .build()
            .unwrap();
        assert!(PipelinePlan::resolve(&config, None).unwrap().compress_resources);
    }
}
