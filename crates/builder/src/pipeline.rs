//! Pipeline assembler for one packaging rule

use crate::actions::{Action, ApkBuilderArgs};
use crate::collaborators::Collaborators;
use crate::configuration::PackagingConfiguration;
use crate::layout::{with_apk_suffix, OutputLayout};
use crate::plan::{DexPlan, PipelinePlan};
use crate::stages::{dex, native_libs, obfuscation, preprocess, Assembly, StageContext};
use apkpipe_errors::{ConfigError, Error};
use serde::Serialize;
use std::path::PathBuf;

/// Entry of the package that is recompressed when resource compression is on.
pub const RESOURCE_TABLE_ENTRY: &str = "resources.arsc";

/// Outputs an invocation registers for caching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildableContext {
    artifacts: Vec<PathBuf>,
}

impl BuildableContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_artifact(&mut self, path: impl Into<PathBuf>) {
        self.artifacts.push(path.into());
    }

    #[must_use]
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }
}

/// Locations an installer needs to push secondary dexes outside the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExopackageInfo {
    pub metadata: PathBuf,
    pub dex_directory: PathBuf,
}

/// A packaging rule: configuration, collaborators and the resolved plan.
#[derive(Debug, Clone)]
pub struct PackagingRule {
    config: PackagingConfiguration,
    collaborators: Collaborators,
    layout: OutputLayout,
    plan: PipelinePlan,
}

impl PackagingRule {
    /// Resolve the pipeline plan and check the collaborators it needs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when exopackage is enabled without a
    /// deps ABI calculator or pre-dex merge.
    pub fn new(
        config: PackagingConfiguration,
        collaborators: Collaborators,
        layout: OutputLayout,
    ) -> Result<Self, Error> {
        if config.is_exopackage() && collaborators.deps_abi.is_none() {
            return Err(ConfigError::MissingCollaborator {
                target: config.target().to_string(),
                collaborator: "deps ABI calculator".to_string(),
            }
            .into());
        }
        let plan = PipelinePlan::resolve(&config, collaborators.pre_dex_merge.as_deref())?;
        Ok(Self {
            config,
            collaborators,
            layout,
            plan,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PackagingConfiguration {
        &self.config
    }

    #[must_use]
    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    #[must_use]
    pub fn unsigned_apk_path(&self) -> PathBuf {
        self.layout.gen_path(self.config.target(), "%s.unsigned.apk")
    }

    /// Signed but not aligned.
    #[must_use]
    pub fn signed_apk_path(&self) -> PathBuf {
        with_apk_suffix(&self.unsigned_apk_path(), ".signed.apk")
    }

    /// Resource table recompressed, not aligned.
    #[must_use]
    pub fn compressed_apk_path(&self) -> PathBuf {
        with_apk_suffix(&self.unsigned_apk_path(), ".compressed.apk")
    }

    /// The final package.
    #[must_use]
    pub fn apk_path(&self) -> PathBuf {
        with_apk_suffix(&self.unsigned_apk_path(), ".apk")
    }

    #[must_use]
    pub fn primary_dex_path(&self) -> PathBuf {
        self.layout.bin_path(self.config.target(), ".dex/%s/classes.dex")
    }

    #[must_use]
    pub fn proguard_dir(&self) -> PathBuf {
        self.layout.gen_path(self.config.target(), ".proguard/%s")
    }

    /// Build the ordered action list and register the outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the dependency closure cannot be resolved or the
    /// obfuscation mapping is invalid.
    pub fn build_actions(&self, context: &mut BuildableContext) -> Result<Vec<Action>, Error> {
        let closure = self.collaborators.collector.dependency_closure()?;
        let ctx = StageContext {
            config: &self.config,
            layout: &self.layout,
            closure: &closure,
            resources: &self.collaborators.resources,
        };

        let mut assembly = Assembly::new(closure.classpath_entries_to_dex.clone());

        if let Some(hook) = &self.plan.preprocess {
            assembly = preprocess::apply(&ctx, hook, assembly);
        }

        let mut obfuscated = None;
        if let Some(plan) = &self.plan.obfuscation {
            let (next, args) = obfuscation::apply(&ctx, plan, assembly)?;
            context.record_artifact(args.configuration_txt());
            context.record_artifact(args.mapping_txt());
            assembly = next;
            obfuscated = Some(args);
        }

        let (assembly, dex_files) = dex::apply(
            &ctx,
            &self.plan.dex,
            self.plan.optimize_dex,
            obfuscated.as_ref(),
            assembly,
        );
        let (mut assembly, native_dir) = native_libs::apply(&ctx, assembly);

        let mut zip_files = dex_files.secondary_zips;
        zip_files.extend(self.string_assets_zip().cloned());

        let signed = self.signed_apk_path();
        if let Some(parent) = signed.parent() {
            assembly.push(Action::Mkdir {
                path: parent.to_path_buf(),
            });
        }
        let keystore = self.config.keystore();
        assembly.push(Action::BuildApk(ApkBuilderArgs {
            resource_apk: self.collaborators.resources.resource_apk.clone(),
            output: signed.clone(),
            primary_dex: dex_files.primary_dex,
            native_library_dirs: native_dir.into_iter().collect(),
            zip_files,
            third_party_jars: closure.third_party_jars.clone(),
            keystore: keystore.store.clone(),
            keystore_properties: keystore.properties.clone(),
        }));

        let align_input = if self.plan.compress_resources {
            let compressed = self.compressed_apk_path();
            assembly.push(Action::RepackZipEntries {
                input: signed,
                output: compressed.clone(),
                entries: vec![RESOURCE_TABLE_ENTRY.to_string()],
            });
            compressed
        } else {
            signed
        };

        let apk = self.apk_path();
        assembly.push(Action::Zipalign {
            input: align_input,
            output: apk.clone(),
        });
        assembly.push(Action::Echo {
            message: format!(
                "built APK for {} at {}",
                self.config.target().fully_qualified_name(),
                apk.display()
            ),
        });
        context.record_artifact(&apk);

        Ok(assembly.actions)
    }

    /// Present only for exopackage builds.
    #[must_use]
    pub fn exopackage_info(&self) -> Option<ExopackageInfo> {
        if !self.config.is_exopackage() {
            return None;
        }
        self.collaborators
            .pre_dex_merge
            .as_ref()
            .map(|merge| ExopackageInfo {
                metadata: merge.metadata_txt_path(),
                dex_directory: merge.dex_directory(),
            })
    }

    /// Source files whose contents feed the rule key.
    #[must_use]
    pub fn inputs_to_compare(&self) -> Vec<PathBuf> {
        let mut inputs = vec![self.config.manifest().clone()];
        inputs.extend(self.config.obfuscation().project_config.iter().cloned());
        inputs.extend(self.config.dex_split_mode().source_paths());
        inputs
    }

    /// Strings packed as assets, only when the compression mode asks for it.
    #[must_use]
    pub fn string_assets_zip(&self) -> Option<&PathBuf> {
        self.config
            .resource_compression()
            .is_store_strings_as_assets()
            .then_some(self.collaborators.resources.string_assets_zip.as_ref())
            .flatten()
    }

    /// Outputs of other rules that the archive step packs: the resource
    /// archive, string assets, keystore files and pre-dexed directories.
    #[must_use]
    pub fn packaged_inputs(&self) -> Vec<PathBuf> {
        let resources = &self.collaborators.resources;
        let keystore = self.config.keystore();
        let mut inputs = vec![
            resources.resource_apk.clone(),
            resources.android_manifest.clone(),
        ];
        inputs.extend(self.string_assets_zip().cloned());
        inputs.push(keystore.store.clone());
        inputs.push(keystore.properties.clone());
        if let DexPlan::PreDexed {
            secondary_dex_directories,
        } = &self.plan.dex
        {
            inputs.extend(secondary_dex_directories.iter().cloned());
        }
        inputs
    }
}

