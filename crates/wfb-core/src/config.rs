use std::time::Duration;

use wfb_cores::AllocatorConfig;
use wfb_exec::proc::{DEFAULT_IDLE_THRESHOLD, DEFAULT_MEMORY_PERCENT};
use wfb_model::ToolSet;

/// Knobs of the supervisor that are not part of a task specification.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub tools: ToolSet,
    pub allocator: AllocatorConfig,
    /// Time workers get to honour SIGTERM before they are killed.
    pub grace: Duration,
    /// Terminate host processes named like the memory tool after teardown.
    pub sweep_orphans: bool,
    /// Share of host memory used when the task sets no ceiling.
    pub memory_percent: f64,
    /// Utilization (percent) at or below which an accelerator is idle.
    pub idle_threshold: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tools: ToolSet::default(),
            allocator: AllocatorConfig::default(),
            grace: Duration::from_secs(2),
            sweep_orphans: true,
            memory_percent: DEFAULT_MEMORY_PERCENT,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}
