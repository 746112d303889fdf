//! Compatibility runtimes wrapping Windows executables on other hosts

pub mod umu;
pub mod wine;

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::exec::ExecutionTask;
use crate::platform::RuntimeKind;
use crate::process::ProcessSpec;

/// Process running `task` through `runtime`
pub async fn command(ctx: &Context, runtime: RuntimeKind, id: &str, task: &ExecutionTask) -> Result<ProcessSpec> {
    let prefix = task.prefix.as_ref().ok_or_else(|| HangarError::configuration(
        format!("{} has no compatibility prefix for {}", id, task.name),
        Some("Reinstall the product"),
    ))?;

    let spec = match runtime {
        RuntimeKind::Umu => umu::command(ctx, id, prefix, task).await?,
        RuntimeKind::Wine => wine::command(ctx, prefix, task)?,
    };
    Ok(spec.verbose(ctx.config.verbose))
}

fn with_task_env(mut spec: ProcessSpec, task: &ExecutionTask) -> ProcessSpec {
    for pair in &task.env {
        spec = spec.env(pair.clone());
    }
    if let Some(dir) = &task.work_dir {
        spec = spec.work_dir(dir);
    }
    spec
}
