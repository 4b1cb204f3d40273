use std::path::PathBuf;

use clap::Parser;

use wfb_model::{OutputSizes, TaskSpec, ToolCommand, ToolSet};

/// Emulate the resource footprint of one workflow task
///
/// CPU, memory and accelerator load are produced by external saturation
/// tools; file I/O is performed in-process. Several instances may share the
/// host: with `--path-lock` and `--path-cores` each one claims a core of its own.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Task name, used in logs and the run report
    pub name: String,

    /// Input files read during every I/O cycle
    pub inputs: Vec<String>,

    /// Directory inputs and outputs are resolved against
    #[clap(long)]
    pub rundir: Option<PathBuf>,

    /// Share of the compute threads given to CPU workers (0.0 - 1.0)
    #[clap(long, default_value = "0.5")]
    pub percent_cpu: f64,

    /// Total CPU work units
    #[clap(long)]
    pub cpu_work: Option<u64>,

    /// Accelerator work units
    #[clap(long)]
    pub gpu_work: Option<u64>,

    /// Wall-clock budget in seconds; workers are terminated when it expires
    #[clap(long)]
    pub time: Option<u64>,

    /// Memory ceiling in megabytes
    #[clap(long)]
    pub mem: Option<f64>,

    /// Output files as a JSON object of file name to size in bytes
    #[clap(long)]
    pub out: Option<String>,

    /// Lock file guarding the core registry
    #[clap(long)]
    pub path_lock: Option<PathBuf>,

    /// Registry of claimed cores
    #[clap(long)]
    pub path_cores: Option<PathBuf>,

    /// CPU saturation program
    #[clap(long, default_value = "cpu-benchmark")]
    pub cpu_tool: String,

    /// Memory pressure program
    #[clap(long, default_value = "stress-ng")]
    pub memory_tool: String,

    /// Accelerator saturation program
    #[clap(long, default_value = "gpu-benchmark")]
    pub gpu_tool: String,

    /// Accelerator utilization query program
    #[clap(long, default_value = "nvidia-smi")]
    pub gpu_query_tool: String,

    /// Leave stray memory-tool processes alone after teardown
    #[clap(long)]
    pub no_sweep: bool,

    /// Log filter directive, e.g. `info` or `wfb.cores=debug,info`
    #[clap(long, default_value = "info")]
    pub log_level: String,

    /// Log format: text, json or journald
    #[clap(long, default_value = "text")]
    pub log_format: String,
}

impl Args {
    pub fn task_spec(&self) -> TaskSpec {
        let mut spec = TaskSpec::new(&self.name);
        spec.workdir = self.rundir.clone();
        spec.cpu_work = self.cpu_work;
        spec.mem_mb = self.mem;
        spec.gpu_work = self.gpu_work;
        spec.deadline_secs = self.time;
        spec.cpu_fraction = self.percent_cpu;
        spec.outputs = self
            .out
            .as_deref()
            .map(OutputSizes::parse_or_empty)
            .unwrap_or_default();
        spec.inputs = self.inputs.clone();
        spec.path_lock = self.path_lock.clone();
        spec.path_cores = self.path_cores.clone();
        spec
    }

    pub fn tools(&self) -> ToolSet {
        ToolSet {
            cpu: ToolCommand::new(&self.cpu_tool),
            memory: ToolCommand::new(&self.memory_tool),
            gpu: ToolCommand::new(&self.gpu_tool),
            gpu_query: ToolCommand::new(&self.gpu_query_tool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_task_spec_from_flags() {
        let args = Args::parse_from([
            "wfbench",
            "task_0003",
            "a.txt",
            "b.txt",
            "--percent-cpu",
            "0.8",
            "--cpu-work",
            "500",
            "--time",
            "30",
            "--out",
            r#"{"x.out": 1024, "y.out": 10}"#,
        ]);
        let spec = args.task_spec();

        assert_eq!(spec.name, "task_0003");
        assert_eq!(spec.inputs, vec!["a.txt", "b.txt"]);
        assert_eq!(spec.cpu_fraction, 0.8);
        assert_eq!(spec.cpu_work, Some(500));
        assert_eq!(spec.deadline_secs, Some(30));
        assert_eq!(spec.outputs.len(), 2);
        assert!(spec.pinning().is_none());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn malformed_outputs_become_empty() {
        let args = Args::parse_from(["wfbench", "t", "--out", "not json"]);
        assert!(args.task_spec().outputs.is_empty());
    }

    #[test]
    fn defaults_name_the_stock_tools() {
        let args = Args::parse_from(["wfbench", "t"]);
        let tools = args.tools();
        assert_eq!(tools.cpu.program, "cpu-benchmark");
        assert_eq!(tools.memory.program, "stress-ng");
        assert_eq!(args.percent_cpu, 0.5);
    }
}
