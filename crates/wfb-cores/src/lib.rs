//! Exclusive core allocation shared by independently launched task instances.
//!
//! The claimed set lives in a plain text registry file (one core id per line)
//! and every read-modify-write of it happens under `flock(2)` on a separate
//! lock file. There is no lease: a holder that dies without releasing leaves
//! a stale entry behind until somebody edits the registry by hand.

mod error;
pub use error::{CoreRegistryError, CoreResult};

mod lock;

pub mod registry;
pub use registry::CoreRegistry;

pub mod allocator;
pub use allocator::{AllocatorConfig, CoreAllocator};
