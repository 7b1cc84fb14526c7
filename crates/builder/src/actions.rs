//! Build actions produced by the pipeline assembler
//!
//! Actions are plain data. Paths are relative to the project root; the
//! runner resolves them when it executes the list.

use crate::stages::obfuscation::ObfuscationMapping;
use apkpipe_types::{DexSplitStrategy, DexStore};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for the external obfuscator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObfuscateArgs {
    /// Config generated by aapt from the manifest and resources
    pub generated_config: PathBuf,
    /// Dependency fragments followed by the project config
    pub configs: Vec<PathBuf>,
    pub use_android_config_with_optimizations: bool,
    pub optimization_passes: Option<u32>,
    pub mapping: ObfuscationMapping,
    /// Classpath entries of excluded libraries, passed as `-libraryjars`
    pub library_jars: Vec<PathBuf>,
    /// Receives `configuration.txt`, `mapping.txt` and the obfuscated jars
    pub proguard_dir: PathBuf,
}

impl ObfuscateArgs {
    #[must_use]
    pub fn configuration_txt(&self) -> PathBuf {
        self.proguard_dir.join("configuration.txt")
    }

    #[must_use]
    pub fn mapping_txt(&self) -> PathBuf {
        self.proguard_dir.join("mapping.txt")
    }
}

/// Arguments for the external class splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitZipArgs {
    pub inputs: Vec<PathBuf>,
    /// `metadata.txt` written for the runtime loader
    pub secondary_meta: PathBuf,
    pub primary_jar: PathBuf,
    pub secondary_zip_dir: PathBuf,
    /// File name pattern of secondary jars, `%d` is the 1-based index
    pub secondary_pattern: String,
    pub proguard_full_config: Option<PathBuf>,
    pub proguard_mapping: Option<PathBuf>,
    pub primary_dex_patterns: Vec<String>,
    pub primary_dex_classes_file: Option<PathBuf>,
    pub primary_dex_scenario_file: Option<PathBuf>,
    pub scenario_overflow_allowed: bool,
    pub strategy: DexSplitStrategy,
    pub dex_store: DexStore,
    pub report_dir: PathBuf,
    pub use_linear_alloc_split_dex: bool,
    pub linear_alloc_hard_limit: u64,
}

/// Secondary dex outputs whose inputs are only known once the splitter ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryDexArgs {
    /// Directory holding `secondary-N.jar` files
    pub input_dir: PathBuf,
    /// Directory receiving `secondary-N.dex.jar` files
    pub output_dir: PathBuf,
    pub dex_store: DexStore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartDexArgs {
    pub primary_output: PathBuf,
    pub primary_inputs: Vec<PathBuf>,
    pub secondary: Option<SecondaryDexArgs>,
    /// Per-output checksums of the inputs of the last successful dex
    pub success_dir: PathBuf,
    pub optimize: bool,
}

/// Arguments for the archive builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApkBuilderArgs {
    pub resource_apk: PathBuf,
    pub output: PathBuf,
    pub primary_dex: PathBuf,
    pub native_library_dirs: Vec<PathBuf>,
    /// Secondary dex zips and the string assets zip, added entry by entry
    pub zip_files: Vec<PathBuf>,
    pub third_party_jars: Vec<PathBuf>,
    pub keystore: PathBuf,
    pub keystore_properties: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprocessArgs {
    /// Run with `bash -c`
    pub command: String,
    pub in_dir: PathBuf,
    pub out_dir: PathBuf,
}

/// One step of the packaging pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Remove a directory if present, then create it empty
    MakeCleanDirectory { path: PathBuf },
    Mkdir { path: PathBuf },
    /// Link each relative entry to `destination/<entry>`
    SymlinkFilesIntoDirectory {
        entries: Vec<PathBuf>,
        destination: PathBuf,
    },
    Preprocess(PreprocessArgs),
    GenerateProguardConfig {
        manifest: PathBuf,
        resource_dirs: Vec<PathBuf>,
        output: PathBuf,
    },
    Obfuscate(ObfuscateArgs),
    SplitZip(SplitZipArgs),
    SmartDex(SmartDexArgs),
    /// Zip a directory; entries of at least `max_deflate_size` bytes are stored
    ZipDirectoryWithMaxDeflate {
        source: PathBuf,
        zip: PathBuf,
        max_deflate_size: u64,
    },
    CopyDirectoryContents {
        source: PathBuf,
        destination: PathBuf,
    },
    /// Copy one ABI subtree; nothing happens if `source` does not exist
    CopyNativeAbi {
        source: PathBuf,
        destination: PathBuf,
    },
    BuildApk(ApkBuilderArgs),
    /// Rewrite `entries` of `input` at maximum compression
    RepackZipEntries {
        input: PathBuf,
        output: PathBuf,
        entries: Vec<String>,
    },
    Zipalign { input: PathBuf, output: PathBuf },
    Echo { message: String },
}

impl Action {
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::MakeCleanDirectory { .. } => "make_clean_dir",
            Self::Mkdir { .. } => "mkdir",
            Self::SymlinkFilesIntoDirectory { .. } => "symlink_files",
            Self::Preprocess(_) => "preprocess_java_classes",
            Self::GenerateProguardConfig { .. } => "generate_proguard_config",
            Self::Obfuscate(_) => "proguard_obfuscation",
            Self::SplitZip(_) => "split_zip",
            Self::SmartDex(_) => "smart_dex",
            Self::ZipDirectoryWithMaxDeflate { .. } => "zip_dir_max_deflate",
            Self::CopyDirectoryContents { .. } => "cp",
            Self::CopyNativeAbi { .. } => "copy_native_libraries",
            Self::BuildApk(_) => "apk_builder",
            Self::RepackZipEntries { .. } => "repack_zip_entries",
            Self::Zipalign { .. } => "zipalign",
            Self::Echo { .. } => "echo",
        }
    }

    /// Human readable, shell-like rendering used in diagnostics.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::MakeCleanDirectory { path } => {
                format!("rm -rf {0} && mkdir -p {0}", path.display())
            }
            Self::Mkdir { path } => format!("mkdir -p {}", path.display()),
            Self::SymlinkFilesIntoDirectory {
                entries,
                destination,
            } => format!(
                "symlink {} entries into {}",
                entries.len(),
                destination.display()
            ),
            Self::Preprocess(args) => format!("bash -c {}", args.command),
            Self::GenerateProguardConfig {
                manifest, output, ..
            } => format!(
                "aapt package -G {} -M {}",
                output.display(),
                manifest.display()
            ),
            Self::Obfuscate(args) => format!(
                "proguard {} jars into {}",
                args.mapping.len(),
                args.proguard_dir.display()
            ),
            Self::SplitZip(args) => format!(
                "split-zip {} inputs -> {} + {}",
                args.inputs.len(),
                args.primary_jar.display(),
                args.secondary_zip_dir.join(&args.secondary_pattern).display()
            ),
            Self::SmartDex(args) => {
                let mut text = format!("smart_dex {}", args.primary_output.display());
                if let Some(secondary) = &args.secondary {
                    text.push_str(&format!(" {}", secondary.output_dir.display()));
                }
                if !args.optimize {
                    text.push_str(" --no-optimize");
                }
                text
            }
            Self::ZipDirectoryWithMaxDeflate { source, zip, .. } => {
                format!("zip -r {} {}", zip.display(), source.display())
            }
            Self::CopyDirectoryContents {
                source,
                destination,
            } => format!("cp -R {}/* {}", source.display(), destination.display()),
            Self::CopyNativeAbi {
                source,
                destination,
            } => format!(
                "[ -d {0} ] && mkdir -p {1} && cp -R {0}/* {1}",
                source.display(),
                destination.display()
            ),
            Self::BuildApk(args) => format!(
                "apkbuilder {} -z {} -f {}",
                args.output.display(),
                args.resource_apk.display(),
                args.primary_dex.display()
            ),
            Self::RepackZipEntries {
                input,
                output,
                entries,
            } => format!(
                "repack {} from {} into {}",
                entries.join(","),
                input.display(),
                output.display()
            ),
            Self::Zipalign { input, output } => {
                format!("zipalign -f 4 {} {}", input.display(), output.display())
            }
            Self::Echo { message } => format!("echo {message}"),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Resolve `path` against `root` unless it is already absolute.
pub(crate) fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub(crate) fn resolve_all(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths.iter().map(|p| resolve(root, p)).collect()
}

pub(crate) fn resolve_opt(root: &Path, path: Option<&PathBuf>) -> Option<PathBuf> {
    path.map(|p| resolve(root, p))
}

impl ObfuscateArgs {
    pub(crate) fn resolved(&self, root: &Path) -> Self {
        Self {
            generated_config: resolve(root, &self.generated_config),
            configs: resolve_all(root, &self.configs),
            use_android_config_with_optimizations: self.use_android_config_with_optimizations,
            optimization_passes: self.optimization_passes,
            mapping: self.mapping.resolved(root),
            library_jars: resolve_all(root, &self.library_jars),
            proguard_dir: resolve(root, &self.proguard_dir),
        }
    }
}

impl SplitZipArgs {
    pub(crate) fn resolved(&self, root: &Path) -> Self {
        Self {
            inputs: resolve_all(root, &self.inputs),
            secondary_meta: resolve(root, &self.secondary_meta),
            primary_jar: resolve(root, &self.primary_jar),
            secondary_zip_dir: resolve(root, &self.secondary_zip_dir),
            secondary_pattern: self.secondary_pattern.clone(),
            proguard_full_config: resolve_opt(root, self.proguard_full_config.as_ref()),
            proguard_mapping: resolve_opt(root, self.proguard_mapping.as_ref()),
            primary_dex_patterns: self.primary_dex_patterns.clone(),
            primary_dex_classes_file: resolve_opt(root, self.primary_dex_classes_file.as_ref()),
            primary_dex_scenario_file: resolve_opt(root, self.primary_dex_scenario_file.as_ref()),
            scenario_overflow_allowed: self.scenario_overflow_allowed,
            strategy: self.strategy,
            dex_store: self.dex_store,
            report_dir: resolve(root, &self.report_dir),
            use_linear_alloc_split_dex: self.use_linear_alloc_split_dex,
            linear_alloc_hard_limit: self.linear_alloc_hard_limit,
        }
    }
}

impl SmartDexArgs {
    pub(crate) fn resolved(&self, root: &Path) -> Self {
        Self {
            primary_output: resolve(root, &self.primary_output),
            primary_inputs: resolve_all(root, &self.primary_inputs),
            secondary: self.secondary.as_ref().map(|s| SecondaryDexArgs {
                input_dir: resolve(root, &s.input_dir),
                output_dir: resolve(root, &s.output_dir),
                dex_store: s.dex_store,
            }),
            success_dir: resolve(root, &self.success_dir),
            optimize: self.optimize,
        }
    }
}

impl ApkBuilderArgs {
    pub(crate) fn resolved(&self, root: &Path) -> Self {
        Self {
            resource_apk: resolve(root, &self.resource_apk),
            output: resolve(root, &self.output),
            primary_dex: resolve(root, &self.primary_dex),
            native_library_dirs: resolve_all(root, &self.native_library_dirs),
            zip_files: resolve_all(root, &self.zip_files),
            third_party_jars: resolve_all(root, &self.third_party_jars),
            keystore: resolve(root, &self.keystore),
            keystore_properties: resolve(root, &self.keystore_properties),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_native_abi_description_guards_on_source() {
        let action = Action::CopyNativeAbi {
            source: PathBuf::from("native/libs/armeabi"),
            destination: PathBuf::from("out/lib/armeabi"),
        };
        assert_eq!(action.short_name(), "copy_native_libraries");
        assert!(action.description().starts_with("[ -d native/libs/armeabi ]"));
    }

    #[test]
    fn test_smart_dex_description_marks_no_optimize() {
        let action = Action::SmartDex(SmartDexArgs {
            primary_output: PathBuf::from("classes.dex"),
            primary_inputs: vec![],
            secondary: None,
            success_dir: PathBuf::from(".success"),
            optimize: false,
        });
        assert!(action.description().ends_with("--no-optimize"));
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let root = Path::new("/project");
        assert_eq!(resolve(root, Path::new("/abs/x")), PathBuf::from("/abs/x"));
        assert_eq!(resolve(root, Path::new("rel/x")), PathBuf::from("/project/rel/x"));
    }
}
