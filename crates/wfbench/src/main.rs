mod cli;

use clap::Parser;
use tracing::{info, warn};

use wfb_core::{Supervisor, SupervisorConfig};
use wfb_model::HostResources;
use wfb_observe::{LoggerConfig, logger_init};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1) Logger
    let cfg = LoggerConfig {
        format: args.log_format.parse()?,
        level: args.log_level.clone(),
        ..Default::default()
    };
    logger_init(&cfg)?;

    // 2) Task + host
    let spec = args.task_spec();
    let host = HostResources::detect();
    info!(
        task = %spec.name,
        hardware_threads = host.hardware_threads,
        cpu_fraction = spec.cpu_fraction,
        "starting benchmark task"
    );

    // 3) Supervisor, with Ctrl-C cutting the run short
    let sup_cfg = SupervisorConfig {
        tools: args.tools(),
        sweep_orphans: !args.no_sweep,
        ..Default::default()
    };
    let supervisor = Supervisor::new(sup_cfg, host);
    let cancel = supervisor.cancellation();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel.cancel(),
            Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    // 4) Run
    let report = supervisor.run(&spec).await?;
    info!(report = %serde_json::to_string(&report)?, "run report");
    Ok(())
}
