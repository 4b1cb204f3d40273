//! Orchestration of one benchmark task invocation.
//!
//! `Idle → CoreAcquired? → IoStarted? → AcceleratorStarted? → ComputeStarted?
//! → Waiting → Terminating → CoreReleased? → Done`

mod teardown;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use wfb_cores::{CoreAllocator, CoreRegistry, CoreRegistryError};
use wfb_exec::{
    AlternationSignal, CpuPlan, DeviceProbe, IoAlternator, IoHandle, IoPlan, Launcher, SmiProbe,
    WorkerSet,
};
use wfb_model::{CoreId, HostResources, SupervisorState, TaskSpec};

use crate::{config::SupervisorConfig, error::SupervisorError, report::RunReport};

pub struct Supervisor {
    cfg: SupervisorConfig,
    host: HostResources,
    probe: Arc<dyn DeviceProbe>,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(cfg: SupervisorConfig, host: HostResources) -> Self {
        let probe = Arc::new(SmiProbe::new(cfg.tools.gpu_query.clone()));
        Self {
            cfg,
            host,
            probe,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the accelerator utilization source.
    pub fn with_probe(mut self, probe: Arc<dyn DeviceProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Token that cuts the current wait short; teardown still runs.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn host(&self) -> &HostResources {
        &self.host
    }

    /// Run `spec` to completion.
    ///
    /// The allocated core is released whatever happened after it was
    /// acquired; a launch failure is reported only once teardown is over.
    #[instrument(level = "info", skip_all, fields(task = %spec.name))]
    pub async fn run(&self, spec: &TaskSpec) -> Result<RunReport, SupervisorError> {
        spec.validate()?;
        let started = Instant::now();
        let mut report = RunReport::new(&spec.name);

        let allocation = self.acquire_core(spec, &mut report).await?;
        if report.cancelled {
            report.enter(SupervisorState::Done);
            report.elapsed_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        let launcher = Launcher::new(self.cfg.tools.clone(), spec.workdir())
            .with_core(allocation.as_ref().map(|(_, core)| *core))
            .with_memory_percent(self.cfg.memory_percent)
            .with_idle_threshold(self.cfg.idle_threshold);

        let outcome = self.drive(spec, &launcher, &mut report).await;

        if let Some((allocator, core)) = allocation {
            match allocator.release(core).await {
                Ok(()) => report.enter(SupervisorState::CoreReleased),
                Err(e) => warn!(target: "wfb.core.supervisor", core, error = %e, "failed to release core"),
            }
        }

        report.enter(SupervisorState::Done);
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            target: "wfb.core.supervisor",
            elapsed_ms = report.elapsed_ms,
            io_cycles = report.io_cycles,
            deadline_hit = report.deadline_hit,
            cancelled = report.cancelled,
            "task finished"
        );
        outcome.map(|()| report)
    }

    async fn acquire_core(
        &self,
        spec: &TaskSpec,
        report: &mut RunReport,
    ) -> Result<Option<(CoreAllocator, CoreId)>, SupervisorError> {
        let Some(pinning) = spec.pinning() else {
            debug!(target: "wfb.core.supervisor", "no lock/registry paths; core pinning disabled");
            return Ok(None);
        };
        let registry = CoreRegistry::open(&pinning, self.host.hardware_threads)?;
        let allocator = CoreAllocator::with_config(registry, self.cfg.allocator);

        match allocator.acquire_until(&self.cancel).await {
            Ok(core) => {
                report.core = Some(core);
                report.enter(SupervisorState::CoreAcquired);
                Ok(Some((allocator, core)))
            }
            Err(CoreRegistryError::Cancelled) => {
                warn!(target: "wfb.core.supervisor", "cancelled while waiting for a core");
                report.cancelled = true;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn drive(
        &self,
        spec: &TaskSpec,
        launcher: &Launcher,
        report: &mut RunReport,
    ) -> Result<(), SupervisorError> {
        let mut workers = WorkerSet::new();

        let mut io = if spec.has_io() {
            let plan = IoPlan::from_spec(spec);
            let handle = IoAlternator::new(plan, AlternationSignal::new()).spawn();
            report.enter(SupervisorState::IoStarted);
            Some(handle)
        } else {
            None
        };

        let launched = self.launch(spec, launcher, &mut workers, report).await;
        report.workers = workers.counts();

        let drain_io = match launched {
            Ok(()) => self.wait(spec, &mut workers, io.as_mut(), report).await,
            Err(_) => false,
        };

        report.enter(SupervisorState::Terminating);
        self.teardown(&mut workers, io, drain_io, report).await;

        launched
    }

    async fn launch(
        &self,
        spec: &TaskSpec,
        launcher: &Launcher,
        workers: &mut WorkerSet,
        report: &mut RunReport,
    ) -> Result<(), SupervisorError> {
        if let Some(work) = spec.gpu_work
            && let Some(worker) = launcher
                .launch_accelerator(self.probe.as_ref(), work, spec.deadline_secs)
                .await?
        {
            workers.push(worker);
            report.enter(SupervisorState::AcceleratorStarted);
        }

        if let Some(work) = spec.cpu_work {
            let plan = CpuPlan::new(&self.host, spec.cpu_fraction, work);
            let dropped = plan.dropped(work);
            if dropped > 0 {
                debug!(target: "wfb.core.supervisor", dropped, threads = plan.threads, "cpu work not divisible; remainder dropped");
            }
            for worker in launcher.launch_cpu(plan)? {
                workers.push(worker);
            }
            let mem_threads = self.host.mem_threads(spec.cpu_fraction);
            if let Some(worker) = launcher.launch_memory(mem_threads, spec.mem_mb)? {
                workers.push(worker);
            }
            report.enter(SupervisorState::ComputeStarted);
        }
        Ok(())
    }

    /// Returns `true` when the I/O task is all that was waited for; its
    /// outputs must then be left complete.
    async fn wait(
        &self,
        spec: &TaskSpec,
        workers: &mut WorkerSet,
        io: Option<&mut IoHandle>,
        report: &mut RunReport,
    ) -> bool {
        report.enter(SupervisorState::Waiting);

        if let Some(secs) = spec.deadline_secs {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    report.deadline_hit = true;
                    let signalled = workers.terminate_all();
                    info!(target: "wfb.core.supervisor", deadline_secs = secs, signalled, "deadline reached; terminating workers");
                    report.forced_kills += workers.reap(self.cfg.grace).await;
                }
                _ = self.cancel.cancelled() => self.on_cancel(report),
            }
            return false;
        }

        if workers.iter().any(|w| w.kind().completes_naturally()) {
            tokio::select! {
                _ = workers.wait_natural() => {}
                _ = self.cancel.cancelled() => self.on_cancel(report),
            }
            return false;
        }

        let Some(io) = io else {
            return false;
        };
        // Nothing else to wait for: let the outputs be written once.
        tokio::select! {
            res = io.wait_cycles(1) => match res {
                Ok(()) => true,
                Err(e) => {
                    warn!(target: "wfb.core.supervisor", error = %e, "io task ended early");
                    false
                }
            },
            _ = self.cancel.cancelled() => {
                self.on_cancel(report);
                false
            }
        }
    }

    fn on_cancel(&self, report: &mut RunReport) {
        warn!(target: "wfb.core.supervisor", "cancelled; tearing down");
        report.cancelled = true;
    }
}

#[cfg(test)]
mod tests;
