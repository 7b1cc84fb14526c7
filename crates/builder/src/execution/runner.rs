//! Sequential executor for an action list

use super::keystore::SigningCredentials;
use super::toolchain::Toolchain;
use super::{fileops, smart_dex, zip_ops};
use crate::actions::{resolve, resolve_all, Action, PreprocessArgs};
use apkpipe_errors::{BuildError, Error};
use apkpipe_events::{AppEvent, EventEmitter, EventSender, FailureContext, PackagingEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Totals of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub actions: usize,
    pub dexed: usize,
    pub dex_cached: usize,
}

/// Executes actions in order against a project root.
pub struct ActionRunner {
    project_root: PathBuf,
    toolchain: Arc<dyn Toolchain>,
    dex_threads: usize,
    tx: Option<EventSender>,
}

impl EventEmitter for ActionRunner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl ActionRunner {
    pub fn new(project_root: impl Into<PathBuf>, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            project_root: project_root.into(),
            toolchain,
            dex_threads: num_cpus::get(),
            tx: None,
        }
    }

    /// Bound on parallel dexer runs; 0 keeps the CPU count.
    #[must_use]
    pub fn with_dex_threads(mut self, threads: usize) -> Self {
        if threads > 0 {
            self.dex_threads = threads;
        }
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn dex_threads(&self) -> usize {
        self.dex_threads
    }

    /// Run every action in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns `ActionFailed` carrying the failing action's description.
    pub async fn run(&self, target: &str, actions: &[Action]) -> Result<RunSummary, Error> {
        self.emit_pipeline_started(target, actions.len());
        let mut summary = RunSummary::default();

        for (index, action) in actions.iter().enumerate() {
            let description = action.description();
            self.emit_action_started(index + 1, actions.len(), action.short_name(), &description);
            let started = Instant::now();

            if let Err(err) = self.execute(action, &mut summary).await {
                let wrapped = Error::from(BuildError::ActionFailed {
                    action: description.clone(),
                    message: err.to_string(),
                });
                self.emit_action_failed(
                    action.short_name(),
                    description,
                    FailureContext::from_error(&err),
                );
                self.emit(AppEvent::Packaging(PackagingEvent::PipelineFailed {
                    target: target.to_string(),
                    failure: FailureContext::from_error(&wrapped),
                }));
                return Err(wrapped);
            }

            summary.actions += 1;
            self.emit_action_completed(action.short_name(), started.elapsed());
        }

        let aligned = actions.iter().rev().find_map(|action| match action {
            Action::Zipalign { output, .. } => Some(resolve(&self.project_root, output)),
            _ => None,
        });
        if let Some(apk_path) = aligned {
            self.emit_pipeline_completed(target, apk_path);
        }

        Ok(summary)
    }

    async fn execute(&self, action: &Action, summary: &mut RunSummary) -> Result<(), Error> {
        let root = &self.project_root;
        match action {
            Action::MakeCleanDirectory { path } => fileops::make_clean_dir(&resolve(root, path)).await,
            Action::Mkdir { path } => fileops::mkdir(&resolve(root, path)).await,
            Action::SymlinkFilesIntoDirectory {
                entries,
                destination,
            } => fileops::symlink_files(root, entries, &resolve(root, destination)).await,
            Action::Preprocess(args) => {
                let args = PreprocessArgs {
                    command: args.command.clone(),
                    in_dir: resolve(root, &args.in_dir),
                    out_dir: resolve(root, &args.out_dir),
                };
                self.toolchain.run_preprocess(&args).await
            }
            Action::GenerateProguardConfig {
                manifest,
                resource_dirs,
                output,
            } => {
                self.toolchain
                    .generate_proguard_config(
                        &resolve(root, manifest),
                        &resolve_all(root, resource_dirs),
                        &resolve(root, output),
                    )
                    .await
            }
            Action::Obfuscate(args) => self.toolchain.obfuscate(&args.resolved(root)).await,
            Action::SplitZip(args) => self.toolchain.split_zip(&args.resolved(root)).await,
            Action::SmartDex(args) => {
                let outcomes = smart_dex::smart_dex(
                    Arc::clone(&self.toolchain),
                    &args.resolved(root),
                    self.dex_threads,
                )
                .await?;
                for outcome in outcomes {
                    if outcome.cached {
                        summary.dex_cached += 1;
                    } else {
                        summary.dexed += 1;
                    }
                    self.emit(AppEvent::Packaging(PackagingEvent::DexUnit {
                        output: outcome.output,
                        cached: outcome.cached,
                    }));
                }
                Ok(())
            }
            Action::ZipDirectoryWithMaxDeflate {
                source,
                zip,
                max_deflate_size,
            } => zip_ops::zip_directory_with_max_deflate(
                &resolve(root, source),
                &resolve(root, zip),
                *max_deflate_size,
            )
            .await
            .map(|_| ()),
            Action::CopyDirectoryContents {
                source,
                destination,
            } => fileops::copy_dir_contents(&resolve(root, source), &resolve(root, destination))
                .await
                .map(|_| ()),
            Action::CopyNativeAbi {
                source,
                destination,
            } => {
                let copied =
                    fileops::copy_native_abi(&resolve(root, source), &resolve(root, destination))
                        .await?;
                if !copied {
                    self.emit_debug(format!("no native libraries at {}", source.display()));
                }
                Ok(())
            }
            Action::BuildApk(args) => {
                let args = args.resolved(root);
                let credentials =
                    SigningCredentials::load(&args.keystore, &args.keystore_properties).await?;
                self.toolchain.build_apk(&args, &credentials).await
            }
            Action::RepackZipEntries {
                input,
                output,
                entries,
            } => {
                zip_ops::repack_zip_entries(&resolve(root, input), &resolve(root, output), entries)
                    .await
            }
            Action::Zipalign { input, output } => {
                self.toolchain
                    .zipalign(&resolve(root, input), &resolve(root, output))
                    .await
            }
            Action::Echo { message } => {
                self.emit(AppEvent::Packaging(PackagingEvent::Message {
                    text: message.clone(),
                }));
                Ok(())
            }
        }
    }
}
