//! Command line interface definition

use apkpipe_types::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "apkpipe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Android APK packaging pipeline", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Directory classpath entries are relative to
    #[arg(long, global = true, value_name = "DIR")]
    pub project_root: Option<PathBuf>,

    /// Root of the gen/ and bin/ trees, relative to the project root
    #[arg(long, global = true, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the action list for a binary without running it
    Plan {
        /// Binary definition file
        #[arg(long, value_name = "PATH")]
        definition: PathBuf,
    },

    /// Build the APK for a binary
    Build {
        /// Binary definition file
        #[arg(long, value_name = "PATH")]
        definition: PathBuf,

        /// Parallel dexer runs, 0 for one per CPU
        #[arg(long, env = "APKPIPE_DEX_THREADS")]
        dex_threads: Option<usize>,
    },

    /// Print the key that decides whether packaging can be skipped
    CacheKey {
        /// Binary definition file
        #[arg(long, value_name = "PATH")]
        definition: PathBuf,
    },
}

impl Commands {
    pub fn definition(&self) -> &PathBuf {
        match self {
            Self::Plan { definition }
            | Self::Build { definition, .. }
            | Self::CacheKey { definition } => definition,
        }
    }
}
