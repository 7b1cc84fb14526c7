//! Obfuscation gate
//!
//! Maps every classpath entry to an obfuscated jar under the proguard
//! directory and emits the config generation and obfuscator actions.

use super::{Assembly, StageContext};
use crate::actions::{resolve, Action, ObfuscateArgs};
use crate::plan::ObfuscationPlan;
use apkpipe_errors::{BuildError, Error};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const OBFUSCATED_SUFFIX: &str = "-obfuscated.jar";

/// Ordered input to output mapping handed to the obfuscator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ObfuscationMapping {
    entries: Vec<(PathBuf, PathBuf)>,
}

impl ObfuscationMapping {
    /// Build the mapping for `inputs` rooted under `proguard_dir`.
    ///
    /// # Errors
    ///
    /// Fails on an absolute input, or when two inputs would be written to
    /// the same obfuscated jar.
    pub fn build(proguard_dir: &Path, inputs: &[PathBuf]) -> Result<Self, Error> {
        let mut seen: HashMap<PathBuf, &PathBuf> = HashMap::with_capacity(inputs.len());
        let mut entries = Vec::with_capacity(inputs.len());

        for input in inputs {
            let output = output_for(proguard_dir, input)?;
            if let Some(first) = seen.insert(output.clone(), input) {
                return Err(BuildError::ObfuscationOutputCollision {
                    first: first.display().to_string(),
                    second: input.display().to_string(),
                    output: output.display().to_string(),
                }
                .into());
            }
            entries.push((input.clone(), output));
        }

        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &PathBuf)> {
        self.entries.iter().map(|(input, output)| (input, output))
    }

    /// Obfuscated jars in input order.
    #[must_use]
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|(_, output)| output.clone()).collect()
    }

    pub(crate) fn resolved(&self, root: &Path) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(input, output)| (resolve(root, input), resolve(root, output)))
                .collect(),
        }
    }
}

/// Obfuscated jar path for one classpath entry.
///
/// `a/b/lib.jar` and `a/b/lib` both map to
/// `<proguard_dir>/a/b/lib-obfuscated.jar`.
///
/// # Errors
///
/// Returns an error if `input` is absolute or has no file name.
pub fn output_for(proguard_dir: &Path, input: &Path) -> Result<PathBuf, Error> {
    if input.is_absolute() {
        return Err(BuildError::AbsoluteClasspathEntry {
            path: input.display().to_string(),
        }
        .into());
    }
    let stem = input
        .file_stem()
        .ok_or_else(|| BuildError::InvalidPath {
            path: input.display().to_string(),
            reason: "classpath entry has no file name".to_string(),
        })?
        .to_string_lossy();

    let mut output = proguard_dir.to_path_buf();
    if let Some(parent) = input.parent() {
        output.push(parent);
    }
    output.push(format!("{stem}{OBFUSCATED_SUFFIX}"));
    Ok(output)
}

/// Append the obfuscation actions and rebind the class set to the
/// obfuscated jars.
///
/// # Errors
///
/// Propagates mapping failures.
pub fn apply(
    ctx: &StageContext<'_>,
    plan: &ObfuscationPlan,
    mut assembly: Assembly,
) -> Result<(Assembly, ObfuscateArgs), Error> {
    let proguard_dir = ctx.gen_path(".proguard/%s");
    let generated_config = proguard_dir.join("proguard.txt");

    let mut configs = ctx.closure.proguard_configs.clone();
    if let Some(project) = &plan.settings.project_config {
        if !configs.contains(project) {
            configs.push(project.clone());
        }
    }

    let mapping = ObfuscationMapping::build(&proguard_dir, &assembly.class_units)?;

    assembly.push(Action::MakeCleanDirectory {
        path: proguard_dir.clone(),
    });
    assembly.push(Action::GenerateProguardConfig {
        manifest: ctx.resources.android_manifest.clone(),
        resource_dirs: ctx.closure.resource_dirs.clone(),
        output: generated_config.clone(),
    });

    let args = ObfuscateArgs {
        generated_config,
        configs,
        use_android_config_with_optimizations: plan.settings.use_android_config_with_optimizations,
        optimization_passes: plan.settings.optimization_passes,
        mapping,
        library_jars: plan.library_jars.clone(),
        proguard_dir,
    };
    assembly.push(Action::Obfuscate(args.clone()));
    assembly.class_units = args.mapping.outputs();

    Ok((assembly, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_output_keeps_parent_and_strips_extension() {
        let out = output_for(Path::new("gen/.proguard/app"), Path::new("lib/dep/classes.jar")).unwrap();
        assert_eq!(out, PathBuf::from("gen/.proguard/app/lib/dep/classes-obfuscated.jar"));

        let dir = output_for(Path::new("pg"), Path::new("lib__classes")).unwrap();
        assert_eq!(dir, PathBuf::from("pg/lib__classes-obfuscated.jar"));
    }

    #[test]
    fn test_absolute_entry_rejected() {
        let err = output_for(Path::new("pg"), Path::new("/abs/classes.jar")).unwrap_err();
        assert!(err.to_string().contains("/abs/classes.jar"));
    }

    #[test]
    fn test_collision_detected() {
        let inputs = vec![PathBuf::from("a/lib.jar"), PathBuf::from("a/lib.zip")];
        let err = ObfuscationMapping::build(Path::new("pg"), &inputs).unwrap_err();
        assert!(err.to_string().contains("pg/a/lib-obfuscated.jar"));
    }

    #[test]
    fn test_outputs_follow_input_order() {
        let inputs = vec![PathBuf::from("b/two.jar"), PathBuf::from("a/one.jar")];
        let mapping = ObfuscationMapping::build(Path::new("pg"), &inputs).unwrap();
        assert_eq!(
            mapping.outputs(),
            vec![
                PathBuf::from("pg/b/two-obfuscated.jar"),
                PathBuf::from("pg/a/one-obfuscated.jar"),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_mapping_is_injective(
            names in proptest::collection::btree_set("[a-z]{1,6}(/[a-z]{1,6}){0,2}", 1..16)
        ) {
            let inputs: Vec<PathBuf> = names.iter().map(|n| PathBuf::from(format!("{n}.jar"))).collect();
            let mapping = ObfuscationMapping::build(Path::new("pg"), &inputs).unwrap();
            prop_assert_eq!(mapping.len(), inputs.len());
            let outputs: std::collections::BTreeSet<_> = mapping.outputs().into_iter().collect();
            prop_assert_eq!(outputs.len(), inputs.len());
        }
    }
}
