//! Dex splitting policy types

use crate::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default ceiling for the estimated linear-alloc usage of one dex unit.
pub const DEFAULT_LINEAR_ALLOC_HARD_LIMIT: u64 = 4 * 1024 * 1024;

/// How the splitter balances classes between the primary and secondary units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexSplitStrategy {
    MaximizePrimaryDexSize,
    MinimizePrimaryDexSize,
}

impl DexSplitStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaximizePrimaryDexSize => "maximize_primary_dex_size",
            Self::MinimizePrimaryDexSize => "minimize_primary_dex_size",
        }
    }
}

impl Default for DexSplitStrategy {
    fn default() -> Self {
        Self::MaximizePrimaryDexSize
    }
}

impl fmt::Display for DexSplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DexSplitStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maximize_primary_dex_size" => Ok(Self::MaximizePrimaryDexSize),
            "minimize_primary_dex_size" => Ok(Self::MinimizePrimaryDexSize),
            _ => Err(ParseEnumError::new("dex split strategy", s)),
        }
    }
}

/// Container format of secondary dex units inside the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DexStore {
    Jar,
    Xz,
}

impl DexStore {
    /// File name suffix of a dexed secondary unit, without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jar => "dex.jar",
            Self::Xz => "dex.jar.xz",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jar => "jar",
            Self::Xz => "xz",
        }
    }
}

impl Default for DexStore {
    fn default() -> Self {
        Self::Jar
    }
}

impl fmt::Display for DexStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DexStore {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jar" => Ok(Self::Jar),
            "xz" => Ok(Self::Xz),
            _ => Err(ParseEnumError::new("dex store", s)),
        }
    }
}

/// Everything the splitter needs to know about how a binary is split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexSplitMode {
    pub should_split_dex: bool,
    pub dex_split_strategy: DexSplitStrategy,
    pub dex_store: DexStore,
    pub use_linear_alloc_split_dex: bool,
    pub linear_alloc_hard_limit: u64,
    /// Class name patterns that must land in the primary dex.
    pub primary_dex_patterns: Vec<String>,
    /// Explicit list of classes for the primary dex, one per line.
    pub primary_dex_classes_file: Option<PathBuf>,
    /// Trace of classes loaded during a cold start.
    pub primary_dex_scenario_file: Option<PathBuf>,
    pub is_primary_dex_scenario_overflow_allowed: bool,
}

impl DexSplitMode {
    /// A mode that keeps every class in the primary dex.
    #[must_use]
    pub fn no_split() -> Self {
        Self {
            should_split_dex: false,
            dex_split_strategy: DexSplitStrategy::default(),
            dex_store: DexStore::default(),
            use_linear_alloc_split_dex: false,
            linear_alloc_hard_limit: DEFAULT_LINEAR_ALLOC_HARD_LIMIT,
            primary_dex_patterns: Vec::new(),
            primary_dex_classes_file: None,
            primary_dex_scenario_file: None,
            is_primary_dex_scenario_overflow_allowed: false,
        }
    }

    /// Source files whose contents influence the split.
    #[must_use]
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.primary_dex_classes_file
            .iter()
            .chain(self.primary_dex_scenario_file.iter())
            .cloned()
            .collect()
    }
}

impl Default for DexSplitMode {
    fn default() -> Self {
        Self::no_split()
    }
}
