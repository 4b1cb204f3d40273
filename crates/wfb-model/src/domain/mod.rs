mod output_sizes;
pub use output_sizes::OutputSizes;

mod task_spec;
pub use task_spec::{CorePinning, TaskSpec};

mod host;
pub use host::HostResources;

mod tool;
pub use tool::{ToolCommand, ToolSet};

/// Identifier of a hardware thread, in `[0, hardware_threads)`.
pub type CoreId = u32;

/// Abstract amount of work handed to a saturation tool.
pub type WorkUnits = u64;

/// One mebibyte; memory ceilings are expressed in these.
pub const MIB: u64 = 1024 * 1024;
