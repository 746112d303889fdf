//! Wine builds on macOS hosts, prefix selected through `WINEPREFIX`

use std::path::Path;

use crate::compat::with_task_env;
use crate::context::Context;
use crate::error::Result;
use crate::exec::ExecutionTask;
use crate::process::ProcessSpec;
use crate::releases::runtime;

pub fn command(ctx: &Context, prefix: &Path, task: &ExecutionTask) -> Result<ProcessSpec> {
    let wine = runtime::wine_path(ctx)?;
    let spec = ProcessSpec::new(wine)
        .arg(task.exe.display().to_string())
        .args(task.args.iter().cloned())
        .env(format!("WINEPREFIX={}", prefix.display()));
    Ok(with_task_env(spec, task))
}
