//! Shared data model of a wfbench task invocation.
//!
//! Everything here is plain data: parsed once, then handed to the allocator,
//! the launcher and the supervisor.

mod error;
pub use error::ModelError;

pub mod domain;
pub use domain::*;

pub mod kind;
pub use kind::*;
