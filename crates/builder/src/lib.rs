#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! Packaging pipeline for Android binaries
//!
//! Given a resolved dependency closure, this crate decides which actions
//! turn compiled classes, native libraries and resources into a signed,
//! aligned APK, and which key decides whether that work can be skipped.
//! It also executes the action list against external tools.

pub mod actions;
pub mod cache_key;
pub mod closure;
pub mod collaborators;
pub mod configuration;
pub mod definition;
pub mod execution;
pub mod layout;
pub mod pipeline;
pub mod plan;
pub mod stages;

pub use actions::Action;
pub use cache_key::{CacheKey, ContentAbiCalculator};
pub use closure::{DependencyClosure, DependencyCollector, StaticCollector};
pub use collaborators::{
    Collaborators, ComputeDepsAbi, PackagedResources, PreDexMerge, StaticPreDexMerge,
};
pub use configuration::{
    ExcludedLibrary, Keystore, ObfuscationSettings, PackagingConfiguration,
    PackagingConfigurationBuilder, PreprocessHook,
};
pub use definition::BinaryDefinition;
pub use execution::{ActionRunner, CommandToolchain, RunSummary, SigningCredentials, Toolchain};
pub use layout::OutputLayout;
pub use pipeline::{BuildableContext, ExopackageInfo, PackagingRule};
pub use plan::{DexPlan, PipelinePlan};
pub use stages::obfuscation::ObfuscationMapping;
