//! Launching of CPU, memory and accelerator saturation workers.
//!
//! Launches are fire-and-forget: every function hands back [`WorkerHandle`]s
//! and the caller owns their lifecycle from then on.

mod worker;
pub use worker::{WorkerHandle, WorkerSet};

mod accelerator;
mod cpu;
mod memory;
pub use cpu::CpuPlan;

use std::path::PathBuf;

use wfb_model::{CoreId, ToolSet};

/// Share of host memory requested from the memory tool when the task sets no ceiling.
pub const DEFAULT_MEMORY_PERCENT: f64 = 5.0;

/// Utilization (percent) at or below which an accelerator counts as idle.
pub const DEFAULT_IDLE_THRESHOLD: u32 = 5;

/// Spawns worker processes for one task, optionally pinned to one core.
#[derive(Debug, Clone)]
pub struct Launcher {
    tools: ToolSet,
    core: Option<CoreId>,
    workdir: PathBuf,
    memory_percent: f64,
    idle_threshold: u32,
}

impl Launcher {
    pub fn new(tools: ToolSet, workdir: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            core: None,
            workdir: workdir.into(),
            memory_percent: DEFAULT_MEMORY_PERCENT,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }

    pub fn with_core(mut self, core: Option<CoreId>) -> Self {
        self.core = core;
        self
    }

    pub fn with_memory_percent(mut self, percent: f64) -> Self {
        self.memory_percent = percent;
        self
    }

    pub fn with_idle_threshold(mut self, percent: u32) -> Self {
        self.idle_threshold = percent;
        self
    }

    pub fn core(&self) -> Option<CoreId> {
        self.core
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }
}
