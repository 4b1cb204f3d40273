//! Accelerator utilization queries.
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::trace;

use wfb_model::ToolCommand;

use crate::error::{ExecError, ExecResult};
use crate::util::cmd_program;

/// Utilization reported for one accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceUtilization {
    pub index: u32,
    pub percent: u32,
}

/// Source of per-device utilization figures.
#[async_trait]
pub trait DeviceProbe: Send + Sync {
    async fn utilization(&self) -> ExecResult<Vec<DeviceUtilization>>;
}

/// Queries `nvidia-smi` (or a compatible tool) for `utilization.gpu`.
#[derive(Debug, Clone)]
pub struct SmiProbe {
    tool: ToolCommand,
}

impl SmiProbe {
    pub const QUERY_ARGS: [&'static str; 2] =
        ["--query-gpu=utilization.gpu", "--format=csv,noheader,nounits"];

    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl DeviceProbe for SmiProbe {
    async fn utilization(&self) -> ExecResult<Vec<DeviceUtilization>> {
        let args: Vec<String> = Self::QUERY_ARGS.iter().map(|s| s.to_string()).collect();
        let mut cmd = cmd_program(&self.tool, &args, Path::new("."))?;
        cmd.stdin(Stdio::null()).stderr(Stdio::null());

        let out = cmd
            .output()
            .await
            .map_err(|e| ExecError::DeviceQuery(format!("{}: {e}", self.tool.program)))?;
        if !out.status.success() {
            return Err(ExecError::DeviceQuery(format!(
                "{} exited with {}",
                self.tool.program, out.status
            )));
        }

        let text = String::from_utf8_lossy(&out.stdout);
        trace!(target: "wfb.exec.probe", output = %text, "device query output");
        Ok(parse_utilization(&text))
    }
}

/// Parse one utilization figure per line; the line position is the device
/// index. A CSV header is skipped; blank and unreadable rows (`[N/A]`) keep
/// their index but yield no device.
pub fn parse_utilization(text: &str) -> Vec<DeviceUtilization> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("utilization"))
        .enumerate()
        .filter_map(|(index, line)| {
            let value = line.trim_end_matches('%').trim();
            let percent = value.parse::<f64>().ok().filter(|p| p.is_finite())?;
            Some(DeviceUtilization {
                index: index as u32,
                percent: percent.round().clamp(0.0, 100.0) as u32,
            })
        })
        .collect()
}

/// First device whose utilization is at or below `threshold` percent.
pub fn pick_idle(devices: &[DeviceUtilization], threshold: u32) -> Option<u32> {
    devices
        .iter()
        .find(|d| d.percent <= threshold)
        .map(|d| d.index)
}
