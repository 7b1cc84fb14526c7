//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("in {target}, android_binary() was passed an invalid package type: {value}")]
    InvalidPackageType { target: String, value: String },

    #[error("in {target}, android_binary() was passed an invalid cpu filter: {value}")]
    InvalidCpuFilter { target: String, value: String },

    #[error("in {target}, android_binary() was passed an invalid resource compression mode: {value}")]
    InvalidCompressionMode { target: String, value: String },

    #[error("{target} specified exopackage without pre-dexing, which is invalid")]
    ExopackageWithoutPreDex { target: String },

    #[error("{target} specified exopackage but no {collaborator} was provided")]
    MissingCollaborator {
        target: String,
        collaborator: String,
    },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Provide a configuration file or pass --config."),
            Self::InvalidPackageType { .. } => {
                Some("Use one of: debug, instrumented, release, test.")
            }
            Self::InvalidCpuFilter { .. } => Some("Use one of: arm, armv7, x86, mips."),
            Self::InvalidCompressionMode { .. } => {
                Some("Use one of: disabled, enabled, enabled_with_strings_as_assets.")
            }
            Self::ExopackageWithoutPreDex { .. } => {
                Some("Enable pre-dexing for this target or turn exopackage off.")
            }
            Self::MissingCollaborator { collaborator, .. } if collaborator.contains("pre-dex") => {
                Some("Exopackage builds need a pre-dex merge; add a [pre_dex] section or disable exopackage.")
            }
            Self::MissingCollaborator { .. } => {
                Some("Exopackage builds need a dependency ABI calculator; configure one or disable exopackage.")
            }
            Self::InvalidValue { .. } | Self::ParseError { .. } | Self::MissingField { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::ParseError { .. } => "config.parse_error",
            Self::MissingField { .. } => "config.missing_field",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::InvalidPackageType { .. } => "config.invalid_package_type",
            Self::InvalidCpuFilter { .. } => "config.invalid_cpu_filter",
            Self::InvalidCompressionMode { .. } => "config.invalid_compression_mode",
            Self::ExopackageWithoutPreDex { .. } => "config.exopackage_without_pre_dex",
            Self::MissingCollaborator { .. } => "config.missing_collaborator",
        };
        Some(code)
    }
}
