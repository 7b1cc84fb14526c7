#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for apkpipe
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/apkpipe/config.toml)
//! - Environment variables
//! - CLI flags

use apkpipe_errors::{ConfigError, Error};
use apkpipe_types::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub dex: DexConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    /// Root of the `gen/` and `bin/` trees, relative to the project root
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Directory classpath entries are relative to; current dir when unset
    #[serde(default)]
    pub project_root: Option<PathBuf>,
}

/// Locations of the external tools the pipeline drives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub java: PathBuf,
    /// Dexer taking `--dex [--no-optimize] --output=<out> <inputs>`
    pub dx: PathBuf,
    pub splitter: PathBuf,
    pub proguard_jar: Option<PathBuf>,
    /// SDK root, used to find `tools/proguard/proguard-android*.txt`
    pub android_sdk: Option<PathBuf>,
    pub aapt: PathBuf,
    pub apkbuilder: PathBuf,
    pub apksigner: PathBuf,
    pub zipalign: PathBuf,
    /// Used for the `xz` dex store
    pub xz: PathBuf,
    /// Boot classpath of the target platform, exported to preprocess
    /// commands as `ANDROID_BOOTCLASSPATH`
    pub bootclasspath: Vec<PathBuf>,
}

/// Dexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    #[serde(default)]
    pub threads: usize, // 0 = auto-detect
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Plain,
            out_dir: default_out_dir(),
            project_root: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            dx: PathBuf::from("dx"),
            splitter: PathBuf::from("dex-splitter"),
            proguard_jar: None,
            android_sdk: None,
            aapt: PathBuf::from("aapt"),
            apkbuilder: PathBuf::from("apkbuilder"),
            apksigner: PathBuf::from("apksigner"),
            zipalign: PathBuf::from("zipalign"),
            xz: PathBuf::from("xz"),
            bootclasspath: Vec::new(),
        }
    }
}

impl Default for DexConfig {
    fn default() -> Self {
        Self { threads: 0 }
    }
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Plain
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("buck-out")
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("apkpipe").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or parsed.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds a value that cannot
    /// be parsed into the expected type.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(output) = std::env::var("APKPIPE_OUTPUT") {
            self.general.default_output =
                output.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "APKPIPE_OUTPUT".to_string(),
                    value: output,
                })?;
        }

        if let Ok(out_dir) = std::env::var("APKPIPE_OUT_DIR") {
            self.general.out_dir = PathBuf::from(out_dir);
        }

        if let Ok(root) = std::env::var("APKPIPE_PROJECT_ROOT") {
            self.general.project_root = Some(PathBuf::from(root));
        }

        if let Ok(threads) = std::env::var("APKPIPE_DEX_THREADS") {
            self.dex.threads = threads.parse().map_err(|_| ConfigError::InvalidValue {
                field: "APKPIPE_DEX_THREADS".to_string(),
                value: threads,
            })?;
        }

        for (var, slot) in [
            ("APKPIPE_JAVA", &mut self.tools.java),
            ("APKPIPE_DX", &mut self.tools.dx),
            ("APKPIPE_ZIPALIGN", &mut self.tools.zipalign),
            ("APKPIPE_APKSIGNER", &mut self.tools.apksigner),
        ] {
            if let Ok(value) = std::env::var(var) {
                *slot = PathBuf::from(value);
            }
        }

        Ok(())
    }

    /// Project root, defaulting to the current directory
    #[must_use]
    pub fn project_root(&self) -> PathBuf {
        self.general
            .project_root
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Number of concurrent dex invocations for a configured value
#[must_use]
pub fn calculate_dex_threads(config_value: usize) -> usize {
    if config_value > 0 {
        config_value
    } else {
        num_cpus::get().max(1)
    }
}
