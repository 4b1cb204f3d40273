use tracing::{debug, info, warn};

use wfb_exec::{IoHandle, WorkerSet, sweep_processes};
use wfb_model::WorkerKind;

use crate::{report::RunReport, supervisor::Supervisor};

impl Supervisor {
    /// Best-effort cleanup. Every step runs regardless of what the previous
    /// one achieved, and nothing here can fail the task.
    pub(super) async fn teardown(
        &self,
        workers: &mut WorkerSet,
        io: Option<IoHandle>,
        drain_io: bool,
        report: &mut RunReport,
    ) {
        if let Some(io) = io {
            // A drained task finishes the cycle it started, leaving every
            // output at its exact size; otherwise it is aborted mid-pass.
            report.io_cycles = if drain_io { io.finish().await } else { io.stop().await };
        }

        // Memory pressure holds its allocation until it is killed.
        let killed = workers.kill_kind(WorkerKind::Memory).await;
        if killed > 0 {
            debug!(target: "wfb.core.supervisor", killed, "memory worker killed");
        }

        // Only reachable with workers left after a cancellation or a failed launch.
        let alive = workers.alive();
        if alive > 0 {
            warn!(target: "wfb.core.supervisor", alive, "workers still running; terminating");
            workers.terminate_all();
            report.forced_kills += workers.reap(self.cfg.grace).await;
        }

        if self.cfg.sweep_orphans && workers.count(WorkerKind::Memory) > 0 {
            let name = self.cfg.tools.memory.process_name().to_string();
            let swept = tokio::task::spawn_blocking(move || sweep_processes(&name))
                .await
                .unwrap_or_else(|e| {
                    warn!(target: "wfb.core.supervisor", error = %e, "orphan sweep failed");
                    0
                });
            if swept > 0 {
                info!(target: "wfb.core.supervisor", swept, "terminated lingering memory tool processes");
            }
        }
    }
}
