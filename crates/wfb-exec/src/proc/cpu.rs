use tracing::{debug, info};

use wfb_model::{HostResources, WorkUnits, WorkerKind};

use crate::error::ExecResult;
use crate::proc::{Launcher, WorkerHandle};
use crate::util::cmd_program;
use crate::utils::attach_affinity;

/// How the requested CPU work is split across worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuPlan {
    pub threads: u32,
    /// Work units handed to each worker. Integer division: the remainder is dropped.
    pub share: WorkUnits,
}

impl CpuPlan {
    pub fn new(host: &HostResources, fraction: f64, total_work: WorkUnits) -> Self {
        let threads = host.cpu_threads(fraction);
        let share = match threads {
            0 => 0,
            n => total_work / WorkUnits::from(n),
        };
        Self { threads, share }
    }

    /// Work units lost to the integer split.
    pub fn dropped(&self, total_work: WorkUnits) -> WorkUnits {
        total_work - self.share * WorkUnits::from(self.threads)
    }
}

impl Launcher {
    /// Spawn `plan.threads` CPU-saturation processes, each given `plan.share`.
    pub fn launch_cpu(&self, plan: CpuPlan) -> ExecResult<Vec<WorkerHandle>> {
        let tool = &self.tools.cpu;
        let args = [plan.share.to_string()];

        let mut workers = Vec::with_capacity(plan.threads as usize);
        for _ in 0..plan.threads {
            let mut cmd = cmd_program(tool, &args, &self.workdir)?;
            attach_affinity(&mut cmd, self.core);
            workers.push(WorkerHandle::spawn(WorkerKind::Cpu, &tool.program, cmd)?);
        }

        if workers.is_empty() {
            debug!(target: "wfb.exec.cpu", "cpu fraction leaves no cpu workers");
        } else {
            info!(
                target: "wfb.exec.cpu",
                workers = workers.len(),
                share = plan.share,
                core = ?self.core,
                "cpu workers launched"
            );
        }
        Ok(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfb_model::{ToolCommand, ToolSet};

    #[test]
    fn half_fraction_splits_work_five_ways() {
        let plan = CpuPlan::new(&HostResources::new(10), 0.5, 100);
        assert_eq!(plan, CpuPlan { threads: 5, share: 20 });
        assert_eq!(plan.dropped(100), 0);
    }

    #[test]
    fn remainder_work_is_dropped() {
        let plan = CpuPlan::new(&HostResources::new(4), 0.3, 100);
        assert_eq!(plan, CpuPlan { threads: 3, share: 33 });
        assert_eq!(plan.dropped(100), 1);
    }

    #[test]
    fn zero_fraction_means_no_workers() {
        let plan = CpuPlan::new(&HostResources::new(8), 0.0, 100);
        assert_eq!(plan, CpuPlan { threads: 0, share: 0 });
    }

    #[tokio::test]
    async fn each_worker_receives_its_share() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("shares.log");

        // `sh -c SCRIPT LOG SHARE`: the appended share lands in $1.
        let tools = ToolSet {
            cpu: ToolCommand::new("sh").with_args([
                "-c".to_string(),
                r#"printf '%s\n' "$1" >> "$0""#.to_string(),
                log.display().to_string(),
            ]),
            ..ToolSet::default()
        };
        let launcher = Launcher::new(tools, dir.path());
        let plan = CpuPlan::new(&HostResources::new(10), 0.5, 100);

        let mut workers = launcher.launch_cpu(plan).unwrap();
        assert_eq!(workers.len(), 5);
        for w in workers.iter_mut() {
            assert_eq!(w.kind(), WorkerKind::Cpu);
            assert!(w.wait().await.unwrap().success());
        }

        let text = std::fs::read_to_string(&log).unwrap();
        let shares: Vec<_> = text.lines().collect();
        assert_eq!(shares, vec!["20"; 5]);
    }
}
