use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MIB, ModelError, OutputSizes, WorkUnits};

/// Default share of the compute thread budget devoted to CPU workers.
pub const DEFAULT_CPU_FRACTION: f64 = 0.5;

/// Paths enabling exclusive core pinning across task instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorePinning {
    pub lock: PathBuf,
    pub registry: PathBuf,
}

/// Resource footprint requested for one benchmark task invocation.
///
/// Immutable once parsed: the supervisor only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub name: String,
    /// Directory inputs and outputs are resolved against; workers run there too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_work: Option<WorkUnits>,
    /// Memory ceiling in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_work: Option<WorkUnits>,
    /// Wall-clock deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
    #[serde(default = "default_cpu_fraction")]
    pub cpu_fraction: f64,
    #[serde(default, skip_serializing_if = "OutputSizes::is_empty")]
    pub outputs: OutputSizes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_lock: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_cores: Option<PathBuf>,
}

fn default_cpu_fraction() -> f64 {
    DEFAULT_CPU_FRACTION
}

impl TaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workdir: None,
            cpu_work: None,
            mem_mb: None,
            gpu_work: None,
            deadline_secs: None,
            cpu_fraction: DEFAULT_CPU_FRACTION,
            outputs: OutputSizes::new(),
            inputs: Vec::new(),
            path_lock: None,
            path_cores: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        if !(0.0..=1.0).contains(&self.cpu_fraction) {
            return Err(ModelError::InvalidCpuFraction(self.cpu_fraction));
        }
        if let Some(mem) = self.mem_mb
            && !(mem > 0.0 && mem.is_finite())
        {
            return Err(ModelError::InvalidMemory(mem));
        }
        Ok(())
    }

    /// Core pinning is enabled only when both paths are present.
    pub fn pinning(&self) -> Option<CorePinning> {
        match (&self.path_lock, &self.path_cores) {
            (Some(lock), Some(registry)) => Some(CorePinning {
                lock: lock.clone(),
                registry: registry.clone(),
            }),
            _ => None,
        }
    }

    /// Memory ceiling converted to bytes, used as the I/O chunk size.
    pub fn mem_bytes(&self) -> Option<u64> {
        self.mem_mb
            .map(|mb| (mb * MIB as f64).round() as u64)
            .filter(|b| *b > 0)
    }

    pub fn has_io(&self) -> bool {
        !self.inputs.is_empty() || !self.outputs.is_empty()
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.as_deref().unwrap_or_else(|| Path::new("."))
    }

    pub fn resolve(&self, file: &str) -> PathBuf {
        self.workdir().join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinning_requires_both_paths() {
        let mut spec = TaskSpec::new("t");
        assert!(spec.pinning().is_none());

        spec.path_lock = Some("/tmp/cores.lock".into());
        assert!(spec.pinning().is_none());

        spec.path_cores = Some("/tmp/cores.txt".into());
        let pin = spec.pinning().expect("both paths set");
        assert_eq!(pin.lock, PathBuf::from("/tmp/cores.lock"));
        assert_eq!(pin.registry, PathBuf::from("/tmp/cores.txt"));
    }

    #[test]
    fn validate_checks_fraction_and_name() {
        let mut spec = TaskSpec::new("t");
        assert!(spec.validate().is_ok());

        spec.cpu_fraction = 1.5;
        assert!(matches!(spec.validate(), Err(ModelError::InvalidCpuFraction(_))));

        spec.cpu_fraction = 0.0;
        spec.mem_mb = Some(-3.0);
        assert!(matches!(spec.validate(), Err(ModelError::InvalidMemory(_))));

        assert!(matches!(TaskSpec::new("  ").validate(), Err(ModelError::EmptyName)));
    }

    #[test]
    fn mem_bytes_uses_mebibytes() {
        let mut spec = TaskSpec::new("t");
        assert_eq!(spec.mem_bytes(), None);
        spec.mem_mb = Some(2.0);
        assert_eq!(spec.mem_bytes(), Some(2 * MIB));
        spec.mem_mb = Some(0.5);
        assert_eq!(spec.mem_bytes(), Some(MIB / 2));
    }

    #[test]
    fn files_resolve_against_workdir() {
        let mut spec = TaskSpec::new("t");
        assert_eq!(spec.resolve("in.dat"), PathBuf::from("./in.dat"));
        spec.workdir = Some("/data/run".into());
        assert_eq!(spec.resolve("in.dat"), PathBuf::from("/data/run/in.dat"));
    }

    #[test]
    fn serde_defaults_fill_missing_fields() {
        let spec: TaskSpec = serde_json::from_str(r#"{"name": "blast_0001"}"#).unwrap();
        assert_eq!(spec.cpu_fraction, DEFAULT_CPU_FRACTION);
        assert!(spec.outputs.is_empty());
        assert!(!spec.has_io());
    }
}
