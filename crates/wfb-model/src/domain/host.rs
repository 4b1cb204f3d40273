use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Size of the thread budget split between CPU and memory workers.
pub const DEFAULT_COMPUTE_DIVISOR: u32 = 10;

/// Host facts resolved once at startup and passed around explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResources {
    /// Number of hardware threads; core ids range over `[0, hardware_threads)`.
    pub hardware_threads: u32,
    /// Thread budget shared by CPU and memory workers.
    pub compute_divisor: u32,
}

impl HostResources {
    pub fn new(hardware_threads: u32) -> Self {
        Self {
            hardware_threads,
            compute_divisor: DEFAULT_COMPUTE_DIVISOR,
        }
    }

    pub fn detect() -> Self {
        let threads = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(u32::try_from(threads).unwrap_or(u32::MAX))
    }

    /// Number of CPU-saturation workers: `round(fraction × divisor)`.
    pub fn cpu_threads(&self, fraction: f64) -> u32 {
        let divisor = self.compute_divisor as f64;
        (fraction.clamp(0.0, 1.0) * divisor).round() as u32
    }

    /// Threads left over for the memory-pressure worker.
    pub fn mem_threads(&self, fraction: f64) -> u32 {
        self.compute_divisor.saturating_sub(self.cpu_threads(fraction))
    }
}
