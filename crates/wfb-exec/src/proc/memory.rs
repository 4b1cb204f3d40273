use tracing::{debug, info};

use wfb_model::WorkerKind;

use crate::error::ExecResult;
use crate::proc::{Launcher, WorkerHandle};
use crate::util::cmd_program;
use crate::utils::attach_affinity;

impl Launcher {
    /// Target volume passed to the memory tool: absolute megabytes when the
    /// task sets a ceiling, otherwise a share of host memory.
    pub fn memory_target(&self, mem_mb: Option<f64>) -> String {
        match mem_mb {
            Some(mb) => format!("{}M", (mb.round() as u64).max(1)),
            None => format!("{}%", self.memory_percent),
        }
    }

    /// Spawn one memory-pressure instance running `threads` workers.
    ///
    /// The tool keeps its allocation until it is signalled, so the caller must
    /// tear it down explicitly.
    pub fn launch_memory(&self, threads: u32, mem_mb: Option<f64>) -> ExecResult<Option<WorkerHandle>> {
        if threads == 0 {
            debug!(target: "wfb.exec.memory", "no thread budget left for memory workers");
            return Ok(None);
        }
        let tool = &self.tools.memory;
        let target = self.memory_target(mem_mb);
        let args = [
            "--vm".to_string(),
            threads.to_string(),
            "--vm-bytes".to_string(),
            target.clone(),
            "--vm-keep".to_string(),
        ];

        let mut cmd = cmd_program(tool, &args, &self.workdir)?;
        attach_affinity(&mut cmd, self.core);
        let worker = WorkerHandle::spawn(WorkerKind::Memory, &tool.program, cmd)?;

        info!(
            target: "wfb.exec.memory",
            threads,
            %target,
            core = ?self.core,
            pid = ?worker.pid(),
            "memory worker launched"
        );
        Ok(Some(worker))
    }
}
