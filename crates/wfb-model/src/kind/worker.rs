use serde::{Deserialize, Serialize};

/// Kind of resource a worker saturates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerKind {
    Cpu,
    Memory,
    Accelerator,
    Io,
}

impl WorkerKind {
    /// Short symbolic identifier used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerKind::Cpu => "cpu",
            WorkerKind::Memory => "memory",
            WorkerKind::Accelerator => "accelerator",
            WorkerKind::Io => "io",
        }
    }

    /// Whether the supervisor waits for this kind to exit on its own when no
    /// deadline is set. Memory pressure runs until it is killed.
    pub fn completes_naturally(&self) -> bool {
        matches!(self, WorkerKind::Cpu | WorkerKind::Accelerator)
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}
