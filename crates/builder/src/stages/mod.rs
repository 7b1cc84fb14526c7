//! Stage functions of the pipeline assembler
//!
//! Each stage takes the `Assembly` by value, appends its actions, rebinds the
//! class set if it transforms it, and hands the assembly to the next stage.

pub mod dex;
pub mod native_libs;
pub mod obfuscation;
pub mod preprocess;

use crate::actions::Action;
use crate::closure::DependencyClosure;
use crate::collaborators::PackagedResources;
use crate::configuration::PackagingConfiguration;
use crate::layout::OutputLayout;
use std::path::PathBuf;

/// Read-only inputs shared by all stages of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a PackagingConfiguration,
    pub layout: &'a OutputLayout,
    pub closure: &'a DependencyClosure,
    pub resources: &'a PackagedResources,
}

impl StageContext<'_> {
    #[must_use]
    pub fn bin_path(&self, pattern: &str) -> PathBuf {
        self.layout.bin_path(self.config.target(), pattern)
    }

    #[must_use]
    pub fn gen_path(&self, pattern: &str) -> PathBuf {
        self.layout.gen_path(self.config.target(), pattern)
    }
}

/// Accumulator threaded through the stages.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub actions: Vec<Action>,
    /// Class containers that will be dexed
    pub class_units: Vec<PathBuf>,
}

impl Assembly {
    #[must_use]
    pub fn new(class_units: Vec<PathBuf>) -> Self {
        Self {
            actions: Vec::new(),
            class_units,
        }
    }

    pub(crate) fn push(&mut self, action: Action) {
        self.actions.push(action);
    }
}
