mod error;
pub use error::{ExecError, ExecResult};

mod util;
pub use util::{signal_group, sweep_processes};

pub mod utils;

pub mod proc;
pub use proc::{CpuPlan, Launcher, WorkerHandle, WorkerSet};

pub mod probe;
pub use probe::{DeviceProbe, DeviceUtilization, SmiProbe};

pub mod io;
pub use io::{AlternationSignal, IoAlternator, IoHandle, IoPlan};

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{AlternationSignal, DeviceProbe, IoAlternator, Launcher, WorkerSet};
}
