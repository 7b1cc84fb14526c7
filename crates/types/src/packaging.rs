//! Packaging variant axes

use crate::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Package kinds, taken from the targets the stock Android build files
/// provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Debug,
    Instrumented,
    Release,
    Test,
}

impl PackageType {
    /// Whether the class set must go through the obfuscator.
    #[must_use]
    pub fn is_build_with_obfuscation(self) -> bool {
        self == Self::Release
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Instrumented => "instrumented",
            Self::Release => "release",
            Self::Test => "test",
        }
    }
}

impl Default for PackageType {
    fn default() -> Self {
        Self::Debug
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "instrumented" => Ok(Self::Instrumented),
            "release" => Ok(Self::Release),
            "test" => Ok(Self::Test),
            _ => Err(ParseEnumError::new("package type", s)),
        }
    }
}

impl clap::ValueEnum for PackageType {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Debug, Self::Instrumented, Self::Release, Self::Test]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// CPU architectures a binary can be filtered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetCpuType {
    Arm,
    Armv7,
    X86,
    Mips,
}

impl TargetCpuType {
    /// Native libraries for each architecture live in a fixed ABI
    /// subdirectory of a native library tree.
    #[must_use]
    pub fn abi_directory(self) -> &'static str {
        match self {
            Self::Arm => "armeabi",
            Self::Armv7 => "armeabi-v7a",
            Self::X86 => "x86",
            Self::Mips => "mips",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Armv7 => "armv7",
            Self::X86 => "x86",
            Self::Mips => "mips",
        }
    }
}

impl fmt::Display for TargetCpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetCpuType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arm" => Ok(Self::Arm),
            "armv7" => Ok(Self::Armv7),
            "x86" => Ok(Self::X86),
            "mips" => Ok(Self::Mips),
            _ => Err(ParseEnumError::new("cpu filter", s)),
        }
    }
}

/// How the `resources.arsc` table and localized strings are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCompressionMode {
    Disabled,
    Enabled,
    EnabledWithStringsAsAssets,
}

impl ResourceCompressionMode {
    #[must_use]
    pub fn is_compress_resources(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Non-English strings are moved out of the resource table into an
    /// assets archive.
    #[must_use]
    pub fn is_store_strings_as_assets(self) -> bool {
        matches!(self, Self::EnabledWithStringsAsAssets)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
            Self::EnabledWithStringsAsAssets => "enabled_with_strings_as_assets",
        }
    }
}

impl Default for ResourceCompressionMode {
    fn default() -> Self {
        Self::Disabled
    }
}

impl fmt::Display for ResourceCompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceCompressionMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(Self::Disabled),
            "enabled" => Ok(Self::Enabled),
            "enabled_with_strings_as_assets" => Ok(Self::EnabledWithStringsAsAssets),
            _ => Err(ParseEnumError::new("resource compression mode", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_release_obfuscates() {
        assert!(PackageType::Release.is_build_with_obfuscation());
        assert!(!PackageType::Debug.is_build_with_obfuscation());
        assert!(!PackageType::Instrumented.is_build_with_obfuscation());
        assert!(!PackageType::Test.is_build_with_obfuscation());
    }

    #[test]
    fn test_package_type_parse_is_case_insensitive() {
        assert_eq!("RELEASE".parse::<PackageType>().unwrap(), PackageType::Release);
        assert!("beta".parse::<PackageType>().is_err());
    }

    #[test]
    fn test_abi_directories() {
        assert_eq!(TargetCpuType::Arm.abi_directory(), "armeabi");
        assert_eq!(TargetCpuType::Armv7.abi_directory(), "armeabi-v7a");
        assert_eq!(TargetCpuType::X86.abi_directory(), "x86");
        assert_eq!(TargetCpuType::Mips.abi_directory(), "mips");
    }

    #[test]
    fn test_unknown_cpu_filter_is_rejected() {
        let err = "sparc".parse::<TargetCpuType>().unwrap_err();
        assert_eq!(err.value, "sparc");
    }

    #[test]
    fn test_compression_modes() {
        assert!(!ResourceCompressionMode::Disabled.is_compress_resources());
        assert!(ResourceCompressionMode::Enabled.is_compress_resources());
        assert!(ResourceCompressionMode::EnabledWithStringsAsAssets.is_compress_resources());
        assert!(ResourceCompressionMode::EnabledWithStringsAsAssets.is_store_strings_as_assets());
        assert_eq!(
            "Enabled_With_Strings_As_Assets"
                .parse::<ResourceCompressionMode>()
                .unwrap(),
            ResourceCompressionMode::EnabledWithStringsAsAssets
        );
    }
}
