//! External tool invocation

use apkpipe_errors::{BuildError, Error};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::Command;

/// Command line of one external tool run.
///
/// Environment values may carry secrets, so `Debug` and the trace log only
/// show their keys.
#[derive(Clone)]
pub struct ToolCommand {
    tool: String,
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    env: Vec<(String, OsString)>,
}

impl ToolCommand {
    /// `tool` names the command in errors, `program` is what gets executed.
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `flag` followed by `value`.
    pub fn flag(&mut self, flag: &str, value: impl Into<OsString>) -> &mut Self {
        self.args.push(flag.into());
        self.args.push(value.into());
        self
    }

    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<OsString>) -> &mut Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn env_keys(&self) -> impl Iterator<Item = &str> {
        self.env.iter().map(|(key, _)| key.as_str())
    }

    #[cfg(test)]
    pub(crate) fn argv(&self) -> &[OsString] {
        &self.args
    }

    #[cfg(test)]
    pub(crate) fn environment(&self) -> &[(String, OsString)] {
        &self.env
    }

    /// Run to completion, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns `ToolLaunchFailed` if the program cannot be started and
    /// `ToolFailed` with its stderr if it exits unsuccessfully.
    pub async fn run(&self) -> Result<CommandOutput, Error> {
        tracing::debug!(
            tool = %self.tool,
            program = %self.program.display(),
            args = ?self.args,
            env = ?self.env_keys().collect::<Vec<_>>(),
            "running tool"
        );

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let output = command
            .output()
            .await
            .map_err(|e| BuildError::ToolLaunchFailed {
                tool: self.tool.clone(),
                message: format!("{}: {e}", self.program.display()),
            })?;

        let output = CommandOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        };
        if !output.status.success() {
            return Err(BuildError::ToolFailed {
                tool: self.tool.clone(),
                status: output.status.to_string(),
                stderr: output.stderr_text().trim().to_string(),
            }
            .into());
        }
        Ok(output)
    }
}

impl std::fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCommand")
            .field("tool", &self.tool)
            .field("program", &self.program)
            .field("args", &self.args)
            .field("current_dir", &self.current_dir)
            .field("env", &self.env_keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Captured output of a finished tool.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr() {
        let mut command = ToolCommand::new("bash", "bash");
        command.arg("-c").arg("echo broken >&2; exit 3");
        let err = command.run().await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("bash exited with"));
        assert!(text.contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let err = ToolCommand::new("ghost", "/nonexistent/ghost-tool")
            .run()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to launch ghost"));
    }

    #[tokio::test]
    async fn test_env_and_cwd_are_applied() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut command = ToolCommand::new("bash", "bash");
        command
            .arg("-c")
            .arg("printf '%s' \"$GREETING\" > out.txt")
            .env("GREETING", "hi")
            .current_dir(temp.path());
        command.run().await.unwrap();
        let written = std::fs::read_to_string(temp.path().join("out.txt")).unwrap();
        assert_eq!(written, "hi");
    }

    #[tokio::test]
    async fn test_debug_shows_env_keys_only() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut command = ToolCommand::new("bash", "bash");
        command
            .arg("-c")
            .arg("printf '%s' \"$STORE_PASS\" > pass.txt")
            .env("STORE_PASS", "s3cret")
            .current_dir(temp.path());

        let debug = format!("{command:?}");
        assert!(debug.contains("STORE_PASS"));
        assert!(!debug.contains("s3cret"));

        command.run().await.unwrap();
        let written = std::fs::read_to_string(temp.path().join("pass.txt")).unwrap();
        assert_eq!(written, "s3cret");
    }
}
