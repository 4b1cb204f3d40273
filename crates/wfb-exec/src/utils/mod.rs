pub mod affinity;
pub use affinity::attach_affinity;
