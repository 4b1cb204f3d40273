use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use wfb_model::TaskSpec;

use crate::error::{ExecError, ExecResult};
use crate::io::passes::{DEFAULT_WRITE_CHUNK, read_input, write_output};
use crate::io::signal::AlternationSignal;

/// Files touched by the I/O task, resolved against the run directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoPlan {
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<(PathBuf, u64)>,
    /// Memory ceiling in bytes; bounds both read and append chunk sizes.
    pub chunk: Option<u64>,
}

impl IoPlan {
    pub fn from_spec(spec: &TaskSpec) -> Self {
        Self {
            inputs: spec.inputs.iter().map(|f| spec.resolve(f)).collect(),
            outputs: spec
                .outputs
                .iter()
                .map(|(f, size)| (spec.resolve(f), size))
                .collect(),
            chunk: spec.mem_bytes(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    pub fn write_chunk(&self) -> u64 {
        self.chunk.unwrap_or(DEFAULT_WRITE_CHUNK)
    }
}

/// What one read/write cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub bytes_read: u64,
    pub appends: u64,
}

/// Alternates bulk reads of the inputs with bulk rewrites of the outputs.
///
/// There is no natural end: the owner either aborts it mid-pass with
/// [`IoHandle::stop`] or lets the current cycle complete with [`IoHandle::finish`].
#[derive(Debug)]
pub struct IoAlternator {
    plan: IoPlan,
    signal: AlternationSignal,
    rng: StdRng,
}

impl IoAlternator {
    pub fn new(plan: IoPlan, signal: AlternationSignal) -> Self {
        Self {
            plan,
            signal,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn signal(&self) -> &AlternationSignal {
        &self.signal
    }

    /// Run the loop on the tokio runtime.
    pub fn spawn(self) -> IoHandle {
        let (cycles_tx, cycles_rx) = watch::channel(0u64);
        let signal = self.signal.clone();
        let finish = CancellationToken::new();
        let task = tokio::spawn(self.run(cycles_tx, finish.clone()));
        IoHandle {
            task,
            cycles: cycles_rx,
            signal,
            finish,
        }
    }

    async fn run(mut self, cycles: watch::Sender<u64>, finish: CancellationToken) -> ExecResult<()> {
        loop {
            // Only checked between cycles: a started cycle always completes.
            tokio::select! {
                biased;
                _ = finish.cancelled() => return Ok(()),
                ready = self.signal.wait_set() => ready?,
            }
            let stats = self.passes().await;
            cycles.send_modify(|n| *n += 1);
            trace!(target: "wfb.exec.io", bytes_read = stats.bytes_read, appends = stats.appends, cycle = *cycles.borrow(), "io cycle done");
        }
    }

    /// One full cycle: wait for the signal, read, clear, write, set.
    pub async fn run_cycle(&mut self) -> ExecResult<CycleStats> {
        self.signal.wait_set().await?;
        Ok(self.passes().await)
    }

    async fn passes(&mut self) -> CycleStats {
        let bytes_read = self.read_pass().await;

        self.signal.clear();
        let appends = self.write_pass().await;
        self.signal.set();

        CycleStats { bytes_read, appends }
    }

    async fn read_pass(&self) -> u64 {
        let mut total = 0;
        for path in &self.plan.inputs {
            match read_input(path, self.plan.chunk).await {
                Ok(n) => total += n,
                Err(e) => {
                    warn!(target: "wfb.exec.io", path = %path.display(), error = %e, "input read failed")
                }
            }
        }
        debug!(target: "wfb.exec.io", files = self.plan.inputs.len(), bytes = total, "read pass done");
        total
    }

    async fn write_pass(&mut self) -> u64 {
        debug_assert!(!self.signal.is_set(), "write pass while reads are allowed");
        let chunk = self.plan.write_chunk();
        let mut appends = 0;
        for (path, size) in &self.plan.outputs {
            match write_output(path, *size, chunk, &mut self.rng).await {
                Ok(n) => appends += n,
                Err(e) => {
                    warn!(target: "wfb.exec.io", path = %path.display(), error = %e, "output write failed")
                }
            }
        }
        debug!(target: "wfb.exec.io", files = self.plan.outputs.len(), appends, "write pass done");
        appends
    }
}

/// Owner side of a running [`IoAlternator`].
#[derive(Debug)]
pub struct IoHandle {
    task: JoinHandle<ExecResult<()>>,
    cycles: watch::Receiver<u64>,
    signal: AlternationSignal,
    finish: CancellationToken,
}

impl IoHandle {
    /// Completed read/write cycles so far.
    pub fn cycles(&self) -> u64 {
        *self.cycles.borrow()
    }

    pub fn signal(&self) -> &AlternationSignal {
        &self.signal
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until at least `n` cycles have completed.
    pub async fn wait_cycles(&mut self, n: u64) -> ExecResult<()> {
        self.cycles
            .wait_for(|c| *c >= n)
            .await
            .map(drop)
            .map_err(|_| ExecError::Cancelled)
    }

    /// Abort the task wherever it is and join it. An interrupted write pass
    /// leaves a partially sized output behind. Returns completed cycles.
    pub async fn stop(self) -> u64 {
        self.task.abort();
        self.join().await
    }

    /// Let the cycle in progress (if any) complete, then join the task.
    /// Every output is left at its exact size. Returns completed cycles.
    pub async fn finish(self) -> u64 {
        self.finish.cancel();
        self.join().await
    }

    async fn join(self) -> u64 {
        match self.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(target: "wfb.exec.io", error = %e, "io task ended with error"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(target: "wfb.exec.io", error = %e, "io task panicked"),
        }
        let cycles = *self.cycles.borrow();
        debug!(target: "wfb.exec.io", cycles, "io task stopped");
        cycles
    }
}
