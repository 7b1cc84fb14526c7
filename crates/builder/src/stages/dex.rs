//! Split policy and dex assembly

use super::{Assembly, StageContext};
use crate::actions::{Action, ObfuscateArgs, SecondaryDexArgs, SmartDexArgs, SplitZipArgs};
use crate::layout::{FROYO_DEFLATE_LIMIT_BYTES, SECONDARY_DEX_SUBDIR};
use crate::plan::DexPlan;
use apkpipe_types::DexSplitMode;
use std::path::{Path, PathBuf};

/// File name pattern of the jars written by the splitter.
pub const SECONDARY_JAR_PATTERN: &str = "secondary-%d.jar";

/// What the dex stage hands to the archive builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexFiles {
    pub primary_dex: PathBuf,
    /// One zip per secondary dex directory, entries over the deflate limit stored
    pub secondary_zips: Vec<PathBuf>,
}

/// `<dir>.zip` next to `dir`.
#[must_use]
pub fn zip_path_for(dir: &Path) -> PathBuf {
    let text = dir.to_string_lossy();
    PathBuf::from(format!("{}.zip", text.trim_end_matches('/')))
}

#[must_use]
pub fn apply(
    ctx: &StageContext<'_>,
    plan: &DexPlan,
    optimize: bool,
    obfuscation: Option<&ObfuscateArgs>,
    mut assembly: Assembly,
) -> (Assembly, DexFiles) {
    let primary_dex = ctx.bin_path(".dex/%s/classes.dex");

    let secondary_dirs = match plan {
        DexPlan::Unsplit | DexPlan::Split(_) => {
            if let Some(parent) = primary_dex.parent() {
                assembly.push(Action::Mkdir {
                    path: parent.to_path_buf(),
                });
            }
            let (next, dirs) = add_dexing(ctx, plan, optimize, obfuscation, &primary_dex, assembly);
            assembly = next;
            dirs
        }
        DexPlan::PreDexed {
            secondary_dex_directories,
        } => secondary_dex_directories.clone(),
        DexPlan::Exopackage => Vec::new(),
    };

    let mut secondary_zips = Vec::with_capacity(secondary_dirs.len());
    for dir in &secondary_dirs {
        let zip = zip_path_for(dir);
        assembly.push(Action::ZipDirectoryWithMaxDeflate {
            source: dir.clone(),
            zip: zip.clone(),
            max_deflate_size: FROYO_DEFLATE_LIMIT_BYTES,
        });
        secondary_zips.push(zip);
    }

    (
        assembly,
        DexFiles {
            primary_dex,
            secondary_zips,
        },
    )
}

/// Splitter (when splitting) followed by the smart dex action.
///
/// Returns the secondary directories that must be zipped.
fn add_dexing(
    ctx: &StageContext<'_>,
    plan: &DexPlan,
    optimize: bool,
    obfuscation: Option<&ObfuscateArgs>,
    primary_dex: &Path,
    mut assembly: Assembly,
) -> (Assembly, Vec<PathBuf>) {
    let mut secondary_dirs = Vec::new();

    let (primary_inputs, secondary) = match plan {
        DexPlan::Split(mode) => {
            let split = add_split_zip(ctx, mode, obfuscation, &mut assembly);
            assembly.push(Action::Mkdir {
                path: split.secondary_dex_dir.clone(),
            });
            secondary_dirs.push(split.secondary_meta_parent);
            secondary_dirs.push(split.secondary_dex_parent);
            (
                vec![split.primary_jar],
                Some(SecondaryDexArgs {
                    input_dir: split.secondary_zip_dir,
                    output_dir: split.secondary_dex_dir,
                    dex_store: mode.dex_store,
                }),
            )
        }
        _ => (assembly.class_units.clone(), None),
    };

    let success_dir = ctx.bin_path("__%s_smart_dex__/.success");
    assembly.push(Action::Mkdir {
        path: success_dir.clone(),
    });
    assembly.push(Action::SmartDex(SmartDexArgs {
        primary_output: primary_dex.to_path_buf(),
        primary_inputs,
        secondary,
        success_dir,
        optimize,
    }));

    (assembly, secondary_dirs)
}

struct SplitOutputs {
    primary_jar: PathBuf,
    secondary_zip_dir: PathBuf,
    secondary_meta_parent: PathBuf,
    secondary_dex_parent: PathBuf,
    secondary_dex_dir: PathBuf,
}

fn add_split_zip(
    ctx: &StageContext<'_>,
    mode: &DexSplitMode,
    obfuscation: Option<&ObfuscateArgs>,
    assembly: &mut Assembly,
) -> SplitOutputs {
    let split_zip_dir = ctx.bin_path("__%s_split_zip__");
    let primary_jar = split_zip_dir.join("primary.jar");
    let secondary_meta_parent = split_zip_dir.join("secondary_meta");
    let secondary_meta_dir = secondary_meta_parent.join(SECONDARY_DEX_SUBDIR);
    let secondary_zip_dir = ctx.bin_path("__%s_secondary_zip__");
    let report_dir = ctx.bin_path("__%s_split_zip_report__");

    for path in [
        &split_zip_dir,
        &secondary_meta_dir,
        &secondary_zip_dir,
        &report_dir,
    ] {
        assembly.push(Action::MakeCleanDirectory { path: path.clone() });
    }

    let inputs = assembly.class_units.clone();
    assembly.push(Action::SplitZip(SplitZipArgs {
        inputs,
        secondary_meta: secondary_meta_dir.join("metadata.txt"),
        primary_jar: primary_jar.clone(),
        secondary_zip_dir: secondary_zip_dir.clone(),
        secondary_pattern: SECONDARY_JAR_PATTERN.to_string(),
        proguard_full_config: obfuscation.map(ObfuscateArgs::configuration_txt),
        proguard_mapping: obfuscation.map(ObfuscateArgs::mapping_txt),
        primary_dex_patterns: mode.primary_dex_patterns.clone(),
        primary_dex_classes_file: mode.primary_dex_classes_file.clone(),
        primary_dex_scenario_file: mode.primary_dex_scenario_file.clone(),
        scenario_overflow_allowed: mode.is_primary_dex_scenario_overflow_allowed,
        strategy: mode.dex_split_strategy,
        dex_store: mode.dex_store,
        report_dir,
        use_linear_alloc_split_dex: mode.use_linear_alloc_split_dex,
        linear_alloc_hard_limit: mode.linear_alloc_hard_limit,
    }));

    let secondary_dex_parent = ctx.bin_path("__%s_secondary_dex__");
    let secondary_dex_dir = secondary_dex_parent.join(SECONDARY_DEX_SUBDIR);

    SplitOutputs {
        primary_jar,
        secondary_zip_dir,
        secondary_meta_parent,
        secondary_dex_parent,
        secondary_dex_dir,
    }
}
