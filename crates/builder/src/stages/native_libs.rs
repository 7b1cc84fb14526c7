//! Native library placement

use super::{Assembly, StageContext};
use crate::actions::Action;
use apkpipe_types::TargetCpuType;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Actions copying one native library tree into `destination`.
///
/// With no filter the whole tree is copied. Otherwise only the ABI
/// subdirectories of the requested CPUs are copied, each only if present.
#[must_use]
pub fn copy_native_library(
    source: &Path,
    destination: &Path,
    cpu_filters: &BTreeSet<TargetCpuType>,
) -> Vec<Action> {
    if cpu_filters.is_empty() {
        return vec![Action::CopyDirectoryContents {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        }];
    }

    cpu_filters
        .iter()
        .map(|cpu| {
            let abi = cpu.abi_directory();
            Action::CopyNativeAbi {
                source: source.join(abi),
                destination: destination.join(abi),
            }
        })
        .collect()
}

/// Returns the native library directory handed to the archive builder, if any.
pub fn apply(ctx: &StageContext<'_>, mut assembly: Assembly) -> (Assembly, Option<PathBuf>) {
    if ctx.closure.native_lib_dirs.is_empty() {
        return (assembly, None);
    }

    let lib_dir = ctx.bin_path("__native_libs_%s__").join("lib");
    assembly.push(Action::MakeCleanDirectory {
        path: lib_dir.clone(),
    });
    for native_dir in &ctx.closure.native_lib_dirs {
        for action in copy_native_library(native_dir, &lib_dir, ctx.config.cpu_filters()) {
            assembly.push(action);
        }
    }
    (assembly, Some(lib_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_copies_whole_tree() {
        let actions = copy_native_library(Path::new("libs"), Path::new("out/lib"), &BTreeSet::new());
        assert_eq!(
            actions,
            vec![Action::CopyDirectoryContents {
                source: PathBuf::from("libs"),
                destination: PathBuf::from("out/lib"),
            }]
        );
    }

    #[test]
    fn test_filter_maps_to_abi_directories() {
        let filters: BTreeSet<_> = [TargetCpuType::X86, TargetCpuType::Arm].into_iter().collect();
        let actions = copy_native_library(Path::new("libs"), Path::new("out/lib"), &filters);
        assert_eq!(
            actions,
            vec![
                Action::CopyNativeAbi {
                    source: PathBuf::from("libs/armeabi"),
                    destination: PathBuf::from("out/lib/armeabi"),
                },
                Action::CopyNativeAbi {
                    source: PathBuf::from("libs/x86"),
                    destination: PathBuf::from("out/lib/x86"),
                },
            ]
        );
    }
}
