//! Target/host execution matrix
//!
//! Every install and launch decision that depends on the pair of operating
//! systems involved goes through [`strategy`], a table lookup keyed by
//! `(target, host)`.

use crate::error::{HangarError, Result};
use crate::model::OperatingSystem;

/// Compatibility runtime used to run a Windows product elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeKind {
    /// Wine binary build (macOS hosts)
    Wine,
    /// Proton driven through umu-run with a generated config (Linux hosts)
    Umu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Native,
    CompatibilityLayer(RuntimeKind),
    Reject(&'static str),
}

use OperatingSystem::{Linux, MacOS, Windows};

const MACOS_ONLY: &str = "macOS titles run only on macOS";
const LINUX_ONLY: &str = "Linux titles run only on Linux";

const MATRIX: [((OperatingSystem, OperatingSystem), ExecutionStrategy); 9] = [
    ((MacOS, MacOS), ExecutionStrategy::Native),
    ((MacOS, Linux), ExecutionStrategy::Reject(MACOS_ONLY)),
    ((MacOS, Windows), ExecutionStrategy::Reject(MACOS_ONLY)),
    ((Linux, Linux), ExecutionStrategy::Native),
    ((Linux, MacOS), ExecutionStrategy::Reject(LINUX_ONLY)),
    ((Linux, Windows), ExecutionStrategy::Reject(LINUX_ONLY)),
    ((Windows, Windows), ExecutionStrategy::Native),
    ((Windows, MacOS), ExecutionStrategy::CompatibilityLayer(RuntimeKind::Wine)),
    ((Windows, Linux), ExecutionStrategy::CompatibilityLayer(RuntimeKind::Umu)),
];

/// Look up how a `target` product is handled on `host`
pub fn strategy(target: OperatingSystem, host: OperatingSystem) -> ExecutionStrategy {
    if let Some((_, strategy)) = MATRIX.iter().find(|(key, _)| *key == (target, host)) {
        return *strategy;
    }
    if target == OperatingSystem::Unknown {
        ExecutionStrategy::Reject("unsupported operating system")
    } else {
        ExecutionStrategy::Reject("unsupported host operating system")
    }
}

/// Same as [`strategy`] with rejections turned into errors
pub fn require(target: OperatingSystem, host: OperatingSystem) -> Result<ExecutionStrategy> {
    match strategy(target, host) {
        ExecutionStrategy::Reject(reason) => Err(HangarError::UnsupportedPlatform {
            target,
            host,
            reason: reason.to_string(),
        }),
        supported => Ok(supported),
    }
}
