//! External tool invocation

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{HangarError, Result};

/// Fully described process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// `KEY=VALUE` pairs added on top of the inherited environment
    pub env: Vec<String>,
    pub work_dir: Option<PathBuf>,
    /// Inherit stdout/stderr instead of discarding them
    pub verbose: bool,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, pair: impl Into<String>) -> Self {
        self.env.push(pair.into());
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in self.env.iter().filter_map(|pair| pair.split_once('=')) {
            command.env(key, value);
        }
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }
        if self.verbose {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::piped());
        }
        command
    }

    /// Run to completion, failing on a non-zero exit
    pub async fn run(&self) -> Result<()> {
        debug!("Running {} {}", self.program.display(), self.args.join(" "));
        let output = self
            .command()
            .output()
            .await
            .map_err(|source| HangarError::ProcessSpawn {
                program: self.program_name(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or_default();
        Err(HangarError::ProcessFailed {
            program: self.program_name(),
            status: if last_line.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, last_line.trim())
            },
        })
    }

    /// Run a game: a non-zero exit is reported, not failed
    pub async fn launch(&self) -> Result<Option<i32>> {
        info!("Launching {}", self.program_name());
        let status = self
            .command()
            .stderr(if self.verbose { Stdio::inherit() } else { Stdio::null() })
            .status()
            .await
            .map_err(|source| HangarError::ProcessSpawn {
                program: self.program_name(),
                source,
            })?;
        Ok(status.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_failed_exit_with_stderr() {
        let err = ProcessSpec::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run()
            .await
            .unwrap_err();
        match err {
            HangarError::ProcessFailed { program, status } => {
                assert_eq!(program, "sh");
                assert!(status.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_environment_and_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        ProcessSpec::new("sh")
            .args(["-c", "test \"$HANGAR_TEST\" = yes && touch marker"])
            .env("HANGAR_TEST=yes")
            .work_dir(dir.path())
            .run()
            .await
            .unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = ProcessSpec::new("/nonexistent/hangar-tool").run().await.unwrap_err();
        assert_eq!(err.category(), "process_spawn");
    }
}
