//! `goggame-<id>.info` descriptors and their play tasks

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FileOperation, HangarError, Result};
use crate::exec::ExecutionTask;

/// Descriptors sit a few levels below the install root
const MAX_SEARCH_DEPTH: usize = 6;
const FILE_TASK: &str = "FileTask";
const GAME_CATEGORY: &str = "game";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameInfo {
    pub game_id: String,
    pub name: String,
    pub play_tasks: Vec<PlayTask>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayTask {
    pub category: String,
    pub is_primary: bool,
    #[serde(rename = "type")]
    pub task_type: String,
    pub name: String,
    pub path: String,
    pub working_dir: String,
    pub arguments: String,
}

impl PlayTask {
    fn is_file_task(&self) -> bool {
        self.task_type == FILE_TASK && !self.path.is_empty()
    }
}

impl GameInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| HangarError::fs(path, FileOperation::Read, e))?;
        serde_json::from_slice(&bytes).map_err(|source| HangarError::Serialization {
            context: format!("game info {}", path.display()),
            source,
        })
    }

    /// Named file task, else the primary one, else the first game task
    pub fn select_task(&self, name: Option<&str>) -> Option<&PlayTask> {
        let mut file_tasks = self.play_tasks.iter().filter(|task| task.is_file_task());
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            return file_tasks.find(|task| task.name == name);
        }
        self.play_tasks
            .iter()
            .filter(|task| task.is_file_task())
            .find(|task| task.is_primary)
            .or_else(|| {
                self.play_tasks
                    .iter()
                    .filter(|task| task.is_file_task())
                    .find(|task| task.category == GAME_CATEGORY)
            })
    }

    /// Apply the selected play task to `task`; paths resolve against the descriptor's directory
    pub fn apply(&self, info_path: &Path, play_task: Option<&str>, task: ExecutionTask) -> Option<ExecutionTask> {
        let selected = self.select_task(play_task)?;
        let base = info_path.parent().unwrap_or_else(|| Path::new("."));
        let exe = base.join(portable_path(&selected.path));
        let work_dir = if selected.working_dir.is_empty() {
            exe.parent().map(Path::to_path_buf)
        } else {
            Some(base.join(portable_path(&selected.working_dir)))
        };

        let mut task = task.with_exe(exe);
        if !selected.name.is_empty() {
            task.name = selected.name.clone();
        }
        if task.work_dir.is_none() {
            task.work_dir = work_dir;
        }
        let mut args = split_arguments(&selected.arguments);
        args.append(&mut task.args);
        task.args = args;
        Some(task)
    }
}

/// First `goggame-<id>.info` below `root`
pub fn find_game_info(root: &Path, id: &str) -> Option<PathBuf> {
    let filename = format!("goggame-{}.info", id);
    let found = WalkDir::new(root)
        .max_depth(MAX_SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter()
        // The Windows system tree of a prefix never holds game data
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name().eq_ignore_ascii_case("windows")))
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == filename.as_str())
        .map(|entry| entry.into_path());
    match &found {
        Some(path) => debug!("Found game info {}", path.display()),
        None => debug!("No {} below {}", filename, root.display()),
    }
    found
}

/// Descriptor paths use Windows separators regardless of platform
fn portable_path(path: &str) -> PathBuf {
    PathBuf::from(path.replace('\\', "/"))
}

/// Split an argument string on whitespace, keeping double-quoted runs together
pub fn split_arguments(arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for c in arguments.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}
