use tracing::{info, warn};

use wfb_model::{WorkUnits, WorkerKind};

use crate::error::ExecResult;
use crate::probe::{DeviceProbe, pick_idle};
use crate::proc::{Launcher, WorkerHandle};
use crate::util::cmd_program;

impl Launcher {
    /// Launch one accelerator-saturation process on the first idle device.
    ///
    /// No device, a failing query or only busy devices all skip the phase:
    /// the result is `Ok(None)`, never an error.
    pub async fn launch_accelerator(
        &self,
        probe: &dyn DeviceProbe,
        work: WorkUnits,
        time_budget_secs: Option<u64>,
    ) -> ExecResult<Option<WorkerHandle>> {
        let devices = match probe.utilization().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(target: "wfb.exec.gpu", error = %e, "accelerator query failed; skipping accelerator work");
                return Ok(None);
            }
        };
        let Some(device) = pick_idle(&devices, self.idle_threshold) else {
            warn!(
                target: "wfb.exec.gpu",
                devices = devices.len(),
                threshold = self.idle_threshold,
                "no idle accelerator; skipping accelerator work"
            );
            return Ok(None);
        };

        let tool = &self.tools.gpu;
        let mut args = vec![work.to_string()];
        if let Some(secs) = time_budget_secs {
            args.push(secs.to_string());
        }
        args.push(device.to_string());

        let cmd = cmd_program(tool, &args, &self.workdir)?;
        let worker = WorkerHandle::spawn(WorkerKind::Accelerator, &tool.program, cmd)?;
        info!(target: "wfb.exec.gpu", device, work, time = ?time_budget_secs, pid = ?worker.pid(), "accelerator worker launched");
        Ok(Some(worker))
    }
}
