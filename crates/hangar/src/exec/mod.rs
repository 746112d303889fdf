//! Launch resolution: turning an installed product into a process to run

pub mod gameinfo;
pub mod launcher;
pub mod resolver;

use std::path::PathBuf;

use crate::platform::RuntimeKind;

pub use gameinfo::{GameInfo, PlayTask, find_game_info};
pub use launcher::command;
pub use resolver::{RunRequest, merge_env, resolve};

/// One launch attempt, built fresh for every run and never stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionTask {
    /// Display name, usually the executable or launcher file name
    pub name: String,
    pub exe: PathBuf,
    pub work_dir: Option<PathBuf>,
    pub args: Vec<String>,
    /// `KEY=VALUE` overrides
    pub env: Vec<String>,
    /// Compatibility prefix the task runs in, if any
    pub prefix: Option<PathBuf>,
    pub runtime: Option<RuntimeKind>,
}

impl ExecutionTask {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        let exe = exe.into();
        Self {
            name: file_name(&exe),
            exe,
            ..Default::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn runtime(mut self, runtime: RuntimeKind) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Point the task at `exe`, keeping env, args and prefix
    pub fn with_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.exe = exe.into();
        self.name = file_name(&self.exe);
        self
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
