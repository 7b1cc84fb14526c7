//! Executing an action list

pub mod command;
pub mod fileops;
pub mod keystore;
pub mod runner;
pub mod smart_dex;
pub mod toolchain;
pub mod zip_ops;

pub use command::{CommandOutput, ToolCommand};
pub use keystore::SigningCredentials;
pub use runner::{ActionRunner, RunSummary};
pub use smart_dex::{DexJob, DexOutcome};
pub use toolchain::{CommandToolchain, Toolchain};
