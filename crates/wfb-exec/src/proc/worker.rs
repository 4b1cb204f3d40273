use std::collections::BTreeMap;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use wfb_model::WorkerKind;

use crate::error::{ExecError, ExecResult};

/// A spawned worker process and the process group it leads.
#[derive(Debug)]
pub struct WorkerHandle {
    kind: WorkerKind,
    child: Child,
    pgid: Option<u32>,
    exited: Option<ExitStatus>,
}

impl WorkerHandle {
    pub(crate) fn spawn(kind: WorkerKind, program: &str, mut cmd: Command) -> ExecResult<Self> {
        let child = cmd.spawn().map_err(|e| ExecError::Spawn {
            program: program.to_string(),
            reason: e.to_string(),
        })?;
        let pgid = child.id();
        trace!(target: "wfb.exec.proc", %kind, program, pid = ?pgid, "worker spawned");
        Ok(Self {
            kind,
            child,
            pgid,
            exited: None,
        })
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Pid of the worker, which is also its process-group id.
    pub fn pid(&self) -> Option<u32> {
        self.pgid
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exited
    }

    pub fn is_alive(&mut self) -> bool {
        if self.exited.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exited = Some(status);
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Ask the whole process group to stop (SIGTERM). Best effort.
    pub fn terminate(&mut self) -> bool {
        // A reaped leader frees its pid (and group id) for reuse.
        if self.exited.is_some() {
            return false;
        }
        #[cfg(unix)]
        {
            self.pgid
                .is_some_and(|pgid| crate::util::signal_group(pgid, libc::SIGTERM))
        }
        #[cfg(not(unix))]
        {
            self.child.start_kill().is_ok()
        }
    }

    /// Kill the process group and reap the leader.
    ///
    /// Workers already reaped are left alone: their group id may belong to
    /// somebody else by now. Returns whether a signal was sent.
    pub async fn kill(&mut self) -> bool {
        if self.exited.is_some() {
            return false;
        }
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            crate::util::signal_group(pgid, libc::SIGKILL);
        }
        let _ = self.child.kill().await;
        let _ = self.wait().await;
        true
    }

    /// Wait for the worker to exit on its own.
    pub async fn wait(&mut self) -> ExecResult<ExitStatus> {
        if let Some(status) = self.exited {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exited = Some(status);
        debug!(
            target: "wfb.exec.proc",
            kind = %self.kind,
            pid = ?self.pgid,
            code = ?status.code(),
            success = status.success(),
            "worker exited"
        );
        Ok(status)
    }
}

/// Every worker process launched for one task.
///
/// The structured replacement for tracking loose pids: signals fan out to all
/// groups at once and reaping is bounded by a single grace deadline.
#[derive(Debug, Default)]
pub struct WorkerSet {
    workers: Vec<WorkerHandle>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, worker: WorkerHandle) {
        self.workers.push(worker);
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.iter()
    }

    pub fn count(&self, kind: WorkerKind) -> usize {
        self.workers.iter().filter(|w| w.kind == kind).count()
    }

    pub fn counts(&self) -> BTreeMap<WorkerKind, usize> {
        let mut out = BTreeMap::new();
        for w in &self.workers {
            *out.entry(w.kind).or_default() += 1;
        }
        out
    }

    pub fn alive(&mut self) -> usize {
        let mut alive = 0;
        for w in self.workers.iter_mut() {
            if w.is_alive() {
                alive += 1;
            }
        }
        alive
    }

    /// Block until every worker that finishes on its own (CPU, accelerator) has exited.
    pub async fn wait_natural(&mut self) {
        for w in self.workers.iter_mut().filter(|w| w.kind.completes_naturally()) {
            if let Err(e) = w.wait().await {
                warn!(target: "wfb.exec.proc", kind = %w.kind, error = %e, "failed to wait for worker");
            }
        }
    }

    /// SIGTERM every worker group. Returns how many groups were signalled.
    pub fn terminate_all(&mut self) -> usize {
        self.workers.iter_mut().map(|w| w.terminate()).filter(|sent| *sent).count()
    }

    /// Kill every still-running worker of `kind`. Returns how many were alive.
    pub async fn kill_kind(&mut self, kind: WorkerKind) -> usize {
        let mut killed = 0;
        for w in self.workers.iter_mut().filter(|w| w.kind == kind) {
            if w.is_alive() && w.kill().await {
                killed += 1;
            }
        }
        killed
    }

    /// Reap every worker, giving them until `grace` elapses to exit before
    /// escalating to SIGKILL. Returns how many needed the kill.
    pub async fn reap(&mut self, grace: Duration) -> usize {
        let deadline = Instant::now() + grace;
        let mut forced = 0;
        for w in self.workers.iter_mut() {
            match tokio::time::timeout_at(deadline, w.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!(target: "wfb.exec.proc", kind = %w.kind, error = %e, "wait failed; killing");
                    w.kill().await;
                }
                Err(_) => {
                    debug!(target: "wfb.exec.proc", kind = %w.kind, pid = ?w.pgid, "grace exceeded; killing");
                    w.kill().await;
                    forced += 1;
                }
            }
        }
        forced
    }
}
