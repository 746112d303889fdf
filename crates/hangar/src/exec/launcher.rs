//! Turning an [`ExecutionTask`] into a process invocation

use std::path::Path;

use crate::compat;
use crate::context::Context;
use crate::error::Result;
use crate::exec::ExecutionTask;
use crate::model::OperatingSystem;
use crate::process::ProcessSpec;

/// Process for `task`, wrapped in its compatibility runtime when it has one
pub async fn command(ctx: &Context, id: &str, task: &ExecutionTask) -> Result<ProcessSpec> {
    if let Some(runtime) = task.runtime {
        return compat::command(ctx, runtime, id, task).await;
    }
    Ok(native_command(ctx.host_os(), task).verbose(ctx.config.verbose))
}

/// Host-native invocation of `task`
pub fn native_command(host: OperatingSystem, task: &ExecutionTask) -> ProcessSpec {
    let mut spec = match (host, extension(&task.exe).as_str()) {
        (OperatingSystem::MacOS, "app") => {
            let mut spec = ProcessSpec::new("open").arg(task.exe.display().to_string());
            if !task.args.is_empty() {
                spec = spec.arg("--args").args(task.args.iter().cloned());
            }
            spec
        }
        (OperatingSystem::Windows, "lnk") => ProcessSpec::new("cmd")
            .args(["/C", "start", ""])
            .arg(task.exe.display().to_string())
            .args(task.args.iter().cloned()),
        _ => ProcessSpec::new(&task.exe).args(task.args.iter().cloned()),
    };
    for pair in &task.env {
        spec = spec.env(pair.clone());
    }
    if let Some(dir) = &task.work_dir {
        spec = spec.work_dir(dir);
    }
    spec
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}
