//! Memoized, parallel dexing of the primary and secondary units

use super::toolchain::Toolchain;
use crate::actions::SmartDexArgs;
use apkpipe_errors::{BuildError, Error};
use apkpipe_hash::{Hash, RuleKeyBuilder};
use apkpipe_types::DexStore;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const SECONDARY_JAR_PREFIX: &str = "secondary-";
const SECONDARY_JAR_SUFFIX: &str = ".jar";

/// One dexer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexJob {
    /// Final output, `.dex.jar.xz` for the xz store
    pub output: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub store: Option<DexStore>,
}

impl DexJob {
    /// Path the dexer writes to before any compression.
    fn dexer_output(&self) -> PathBuf {
        match self.store {
            Some(DexStore::Xz) => self.output.with_extension(""),
            _ => self.output.clone(),
        }
    }
}

/// What happened to one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexOutcome {
    pub output: PathBuf,
    pub cached: bool,
}

/// Secondary jars the splitter wrote, ordered by their index.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub async fn discover_secondary_jars(dir: &Path) -> Result<Vec<(u32, PathBuf)>, Error> {
    let mut jars = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dir))?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(index) = name
            .to_str()
            .and_then(|n| n.strip_prefix(SECONDARY_JAR_PREFIX))
            .and_then(|n| n.strip_suffix(SECONDARY_JAR_SUFFIX))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        jars.push((index, entry.path()));
    }
    jars.sort();
    Ok(jars)
}

/// The dex jobs described by `args`, with secondaries discovered on disk.
///
/// # Errors
///
/// Returns an error if the secondary input directory cannot be read.
pub async fn plan_jobs(args: &SmartDexArgs) -> Result<Vec<DexJob>, Error> {
    let mut jobs = vec![DexJob {
        output: args.primary_output.clone(),
        inputs: args.primary_inputs.clone(),
        store: None,
    }];

    if let Some(secondary) = &args.secondary {
        for (index, jar) in discover_secondary_jars(&secondary.input_dir).await? {
            let name = format!(
                "{SECONDARY_JAR_PREFIX}{index}.{}",
                secondary.dex_store.extension()
            );
            jobs.push(DexJob {
                output: secondary.output_dir.join(name),
                inputs: vec![jar],
                store: Some(secondary.dex_store),
            });
        }
    }
    Ok(jobs)
}

/// Remove files in `dir` that no job will produce.
async fn remove_stale_outputs(dir: &Path, jobs: &[DexJob]) -> Result<(), Error> {
    let expected: BTreeSet<&Path> = jobs.iter().map(|job| job.output.as_path()).collect();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dir))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && !expected.contains(path.as_path()) {
            tracing::debug!(path = %path.display(), "removing stale dex output");
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| Error::io_with_path(&e, &path))?;
        }
    }
    Ok(())
}

/// Checksum of a job's inputs and dexer options.
async fn job_checksum(job: &DexJob, optimize: bool) -> Result<Hash, Error> {
    let mut builder = RuleKeyBuilder::new("smart_dex")
        .set_bool("optimize", optimize)
        .set_opt_str("store", job.store.map(DexStore::as_str));
    for input in &job.inputs {
        builder = builder
            .set_str("input", &input.to_string_lossy())
            .set_hash("contents", &Hash::hash_path(input).await?);
    }
    Ok(builder.build())
}

fn success_file(success_dir: &Path, output: &Path) -> Result<PathBuf, Error> {
    let name = output.file_name().ok_or_else(|| BuildError::InvalidPath {
        path: output.display().to_string(),
        reason: "dex output has no file name".to_string(),
    })?;
    Ok(success_dir.join(name))
}

async fn is_up_to_date(success: &Path, output: &Path, checksum: &Hash) -> Result<bool, Error> {
    if !tokio::fs::try_exists(output).await? {
        return Ok(false);
    }
    match tokio::fs::read_to_string(success).await {
        Ok(recorded) => Ok(recorded.trim() == checksum.to_hex()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io_with_path(&e, success)),
    }
}

async fn run_job(
    toolchain: Arc<dyn Toolchain>,
    job: DexJob,
    optimize: bool,
    success: PathBuf,
    checksum: Hash,
) -> Result<DexOutcome, Error> {
    match tokio::fs::remove_file(&success).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io_with_path(&e, &success)),
    }

    let dexer_output = job.dexer_output();
    toolchain.dex(&dexer_output, &job.inputs, optimize).await?;
    if job.store == Some(DexStore::Xz) {
        toolchain.compress_xz(&dexer_output).await?;
    }

    tokio::fs::write(&success, checksum.to_hex())
        .await
        .map_err(|e| Error::io_with_path(&e, &success))?;
    Ok(DexOutcome {
        output: job.output,
        cached: false,
    })
}

/// Dex every unit whose inputs changed since its last successful run.
///
/// At most `threads` dexer invocations run at once. Outcomes are returned
/// in job order.
///
/// # Errors
///
/// Returns the first dexer or filesystem error.
pub async fn smart_dex(
    toolchain: Arc<dyn Toolchain>,
    args: &SmartDexArgs,
    threads: usize,
) -> Result<Vec<DexOutcome>, Error> {
    let jobs = plan_jobs(args).await?;
    if let Some(secondary) = &args.secondary {
        remove_stale_outputs(&secondary.output_dir, &jobs).await?;
    }

    let semaphore = Arc::new(Semaphore::new(threads.max(1)));
    let mut tasks = JoinSet::new();
    let mut outcomes: Vec<Option<DexOutcome>> = vec![None; jobs.len()];

    for (position, job) in jobs.into_iter().enumerate() {
        let checksum = job_checksum(&job, args.optimize).await?;
        let success = success_file(&args.success_dir, &job.output)?;
        if is_up_to_date(&success, &job.output, &checksum).await? {
            outcomes[position] = Some(DexOutcome {
                output: job.output,
                cached: true,
            });
            continue;
        }

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BuildError::TaskFailed {
                message: format!("semaphore acquire error: {e}"),
            })?;
        let toolchain = Arc::clone(&toolchain);
        let optimize = args.optimize;
        tasks.spawn(async move {
            let _permit = permit;
            run_job(toolchain, job, optimize, success, checksum)
                .await
                .map(|outcome| (position, outcome))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (position, outcome) = joined.map_err(|e| BuildError::TaskFailed {
            message: format!("dex task join error: {e}"),
        })??;
        outcomes[position] = Some(outcome);
    }

    Ok(outcomes.into_iter().flatten().collect())
}
