//! Classpath preprocessing hook

use super::{Assembly, StageContext};
use crate::actions::{Action, PreprocessArgs};
use crate::configuration::PreprocessHook;

/// Link every class unit into a clean input directory, run the hook, and
/// rebind each unit `e` to `<out>/e`.
#[must_use]
pub fn apply(ctx: &StageContext<'_>, hook: &PreprocessHook, mut assembly: Assembly) -> Assembly {
    let in_dir = ctx.bin_path("java_classes_preprocess_in_%s");
    let out_dir = ctx.bin_path("java_classes_preprocess_out_%s");

    assembly.push(Action::MakeCleanDirectory {
        path: in_dir.clone(),
    });
    assembly.push(Action::MakeCleanDirectory {
        path: out_dir.clone(),
    });
    let entries = assembly.class_units.clone();
    assembly.push(Action::SymlinkFilesIntoDirectory {
        entries,
        destination: in_dir.clone(),
    });
    assembly.push(Action::Preprocess(PreprocessArgs {
        command: hook.command.clone(),
        in_dir,
        out_dir: out_dir.clone(),
    }));

    assembly.class_units = assembly
        .class_units
        .iter()
        .map(|entry| out_dir.join(entry))
        .collect();
    assembly
}
