use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use wfb_cores::AllocatorConfig;
use wfb_exec::{DeviceUtilization, ExecResult};
use wfb_model::{CorePinning, MIB, ToolCommand, ToolSet, WorkerKind};

use super::*;
use crate::SupervisorConfig;

use wfb_model::SupervisorState::*;

struct Fixed(Vec<u32>);

#[async_trait]
impl DeviceProbe for Fixed {
    async fn utilization(&self) -> ExecResult<Vec<DeviceUtilization>> {
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(i, p)| DeviceUtilization { index: i as u32, percent: *p })
            .collect())
    }
}

/// `sh -c SCRIPT ARG0`; per-invocation arguments follow as `$1..`.
fn sh(script: &str, arg0: &Path) -> ToolCommand {
    ToolCommand::new("sh").with_args([
        "-c".to_string(),
        script.to_string(),
        arg0.display().to_string(),
    ])
}

fn config(tools: ToolSet) -> SupervisorConfig {
    SupervisorConfig {
        tools,
        allocator: AllocatorConfig {
            backoff: Duration::from_millis(20),
            timeout: None,
        },
        grace: Duration::from_secs(2),
        sweep_orphans: false,
        ..SupervisorConfig::default()
    }
}

fn supervisor(tools: ToolSet, threads: u32, devices: Vec<u32>) -> Supervisor {
    Supervisor::new(config(tools), HostResources::new(threads)).with_probe(Arc::new(Fixed(devices)))
}

fn spec_in(dir: &Path) -> TaskSpec {
    let mut spec = TaskSpec::new("task_0001");
    spec.workdir = Some(dir.to_path_buf());
    spec
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn io_only_task_leaves_outputs_complete() {
    let dir = tempfile::tempdir().unwrap();
    let size = 4 * MIB;
    let mut spec = spec_in(dir.path());
    spec.outputs.push("out.dat", size);
    // 64 KiB appends: a second cycle is well under way by teardown time.
    spec.mem_mb = Some(0.0625);

    let sup = supervisor(ToolSet::default(), 4, vec![]);
    for _ in 0..10 {
        let report = sup.run(&spec).await.unwrap();

        assert_eq!(report.states, vec![Idle, IoStarted, Waiting, Terminating, Done]);
        assert!(report.io_cycles >= 1);
        assert!(report.workers.is_empty());
        assert_eq!(std::fs::metadata(dir.path().join("out.dat")).unwrap().len(), size);
    }
}

#[tokio::test]
async fn compute_task_splits_work_and_kills_memory_worker() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("shares.log");
    let tools = ToolSet {
        cpu: sh(r#"printf '%s\n' "$1" >> "$0""#, &log),
        memory: sh("exec sleep 30", Path::new("mem")),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.cpu_work = Some(100);
    spec.cpu_fraction = 0.5;

    let report = supervisor(tools, 10, vec![]).run(&spec).await.unwrap();

    assert_eq!(report.states, vec![Idle, ComputeStarted, Waiting, Terminating, Done]);
    assert_eq!(report.launched(WorkerKind::Cpu), 5);
    assert_eq!(report.launched(WorkerKind::Memory), 1);
    assert!(!report.deadline_hit);
    assert!(report.elapsed_ms < 10_000, "memory worker was waited for");

    let shares = std::fs::read_to_string(&log).unwrap();
    assert_eq!(shares.lines().collect::<Vec<_>>(), vec!["20"; 5]);
}

#[tokio::test]
async fn deadline_terminates_every_worker() {
    let dir = tempfile::tempdir().unwrap();
    let pids = dir.path().join("pids");
    let tools = ToolSet {
        cpu: sh(r#"echo $$ >> "$0"; exec sleep 30"#, &pids),
        memory: sh(r#"echo $$ >> "$0"; exec sleep 30"#, &pids),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.cpu_work = Some(10);
    spec.cpu_fraction = 0.2;
    spec.deadline_secs = Some(1);

    let report = supervisor(tools, 10, vec![]).run(&spec).await.unwrap();

    assert!(report.deadline_hit);
    assert_eq!(report.forced_kills, 0);
    assert!(report.elapsed_ms >= 1_000);
    assert!(report.elapsed_ms < 1_000 + 2_000 + 1_500);

    let text = std::fs::read_to_string(&pids).unwrap();
    let pids: Vec<i32> = text.lines().map(|l| l.trim().parse().unwrap()).collect();
    assert_eq!(pids.len(), 3);
    for pid in pids {
        let rc = unsafe { libc::kill(pid, 0) };
        assert_eq!(rc, -1, "worker {pid} survived the deadline");
    }
}

#[tokio::test]
async fn pinned_task_releases_its_core() {
    let dir = tempfile::tempdir().unwrap();
    let pin = CorePinning {
        lock: dir.path().join("cores.lock"),
        registry: dir.path().join("cores.txt"),
    };
    let tools = ToolSet {
        cpu: sh("exit 0", Path::new("cpu")),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.cpu_work = Some(10);
    spec.cpu_fraction = 1.0;
    spec.path_lock = Some(pin.lock.clone());
    spec.path_cores = Some(pin.registry.clone());

    let report = supervisor(tools, 1, vec![]).run(&spec).await.unwrap();

    assert_eq!(report.core, Some(0));
    assert_eq!(
        report.states,
        vec![Idle, CoreAcquired, ComputeStarted, Waiting, Terminating, CoreReleased, Done]
    );
    assert_eq!(report.launched(WorkerKind::Memory), 0);
    assert!(CoreRegistry::open(&pin, 1).unwrap().claimed().unwrap().is_empty());
}

#[tokio::test]
async fn failed_launch_still_releases_core() {
    let dir = tempfile::tempdir().unwrap();
    let pin = CorePinning {
        lock: dir.path().join("cores.lock"),
        registry: dir.path().join("cores.txt"),
    };
    let tools = ToolSet {
        cpu: ToolCommand::new("wfb-no-such-cpu-benchmark"),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.cpu_work = Some(10);
    spec.path_lock = Some(pin.lock.clone());
    spec.path_cores = Some(pin.registry.clone());

    let err = supervisor(tools, 1, vec![]).run(&spec).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Exec(_)));
    assert!(CoreRegistry::open(&pin, 1).unwrap().claimed().unwrap().is_empty());
}

#[tokio::test]
async fn accelerator_runs_on_idle_device() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("gpu.log");
    let tools = ToolSet {
        gpu: sh(r#"printf '%s ' "$@" > "$0""#, &log),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.gpu_work = Some(50);

    let report = supervisor(tools, 4, vec![90, 0]).run(&spec).await.unwrap();

    assert_eq!(report.states, vec![Idle, AcceleratorStarted, Waiting, Terminating, Done]);
    assert_eq!(report.launched(WorkerKind::Accelerator), 1);
    assert_eq!(std::fs::read_to_string(&log).unwrap().trim_end(), "50 1");
}

#[tokio::test]
async fn busy_accelerators_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec_in(dir.path());
    spec.gpu_work = Some(50);

    let report = supervisor(ToolSet::default(), 4, vec![40, 100]).run(&spec).await.unwrap();

    assert!(!report.visited(AcceleratorStarted));
    assert_eq!(report.launched(WorkerKind::Accelerator), 0);
    assert_eq!(report.state(), Done);
}

#[tokio::test]
async fn cancellation_cuts_the_wait_short() {
    let dir = tempfile::tempdir().unwrap();
    let tools = ToolSet {
        cpu: sh("exec sleep 30", Path::new("cpu")),
        memory: sh("exec sleep 30", Path::new("mem")),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.cpu_work = Some(10);

    let sup = supervisor(tools, 10, vec![]);
    let token = sup.cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let report = sup.run(&spec).await.unwrap();
    assert!(report.cancelled);
    assert!(report.visited(Terminating));
    assert!(report.elapsed_ms < 5_000);
}

#[tokio::test]
async fn invalid_task_is_rejected_before_anything_starts() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec_in(dir.path());
    spec.cpu_fraction = 2.0;

    let err = supervisor(ToolSet::default(), 4, vec![]).run(&spec).await.unwrap_err();
    assert!(matches!(err, SupervisorError::InvalidTask(_)));
}

#[tokio::test]
async fn report_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let report = supervisor(ToolSet::default(), 4, vec![])
        .run(&spec_in(dir.path()))
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["task"], "task_0001");
    assert_eq!(json["states"][0], "idle");
    assert_eq!(json["states"].as_array().unwrap().last().unwrap(), "done");
}

fn pinning_in(dir: &Path, spec: &mut TaskSpec) -> CorePinning {
    let pin = CorePinning {
        lock: dir.join("cores.lock"),
        registry: dir.join("cores.txt"),
    };
    spec.path_lock = Some(pin.lock.clone());
    spec.path_cores = Some(pin.registry.clone());
    pin
}

fn allowed_cpus(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .unwrap()
        .lines()
        .filter_map(|l| l.split(':').nth(1))
        .map(|v| v.trim().to_string())
        .collect()
}

#[tokio::test]
async fn pinned_workers_release_core_after_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let cpu_log = dir.path().join("cpu.affinity");
    let mem_log = dir.path().join("mem.affinity");
    let script = r#"grep Cpus_allowed_list /proc/self/status >> "$0"; exec sleep 30"#;
    let tools = ToolSet {
        cpu: sh(script, &cpu_log),
        memory: sh(script, &mem_log),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.cpu_work = Some(10);
    spec.cpu_fraction = 0.5;
    spec.deadline_secs = Some(1);
    let pin = pinning_in(dir.path(), &mut spec);

    let report = supervisor(tools, 1, vec![]).run(&spec).await.unwrap();

    assert!(report.deadline_hit);
    assert_eq!(report.core, Some(0));
    assert_eq!(
        report.states,
        vec![Idle, CoreAcquired, ComputeStarted, Waiting, Terminating, CoreReleased, Done]
    );
    assert_eq!(report.launched(WorkerKind::Cpu), 5);
    assert_eq!(report.launched(WorkerKind::Memory), 1);

    assert_eq!(allowed_cpus(&cpu_log), vec!["0"; 5]);
    assert_eq!(allowed_cpus(&mem_log), vec!["0"]);
    assert!(CoreRegistry::open(&pin, 1).unwrap().claimed().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_while_registry_is_locked_leaves_no_claim() {
    use std::os::unix::io::AsRawFd;

    let dir = tempfile::tempdir().unwrap();
    let tools = ToolSet {
        cpu: sh("exit 0", Path::new("cpu")),
        ..ToolSet::default()
    };
    let mut spec = spec_in(dir.path());
    spec.cpu_work = Some(10);
    let pin = pinning_in(dir.path(), &mut spec);

    // Another instance holds the registry lock across the cancellation.
    let lock = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&pin.lock)
        .unwrap();
    assert_eq!(unsafe { libc::flock(lock.as_raw_fd(), libc::LOCK_EX) }, 0);

    let sup = supervisor(tools, 1, vec![]);
    let token = sup.cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(lock);
    });

    let report = tokio::time::timeout(Duration::from_secs(10), sup.run(&spec))
        .await
        .expect("run returns once the lock is free")
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.core, None);
    assert!(!report.visited(CoreAcquired));
    assert!(!report.visited(ComputeStarted));
    assert!(CoreRegistry::open(&pin, 1).unwrap().claimed().unwrap().is_empty());
}
