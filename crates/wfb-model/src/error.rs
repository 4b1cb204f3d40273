use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid output size specification: {0}")]
    InvalidOutputSizes(String),
    #[error("cpu fraction must be within [0, 1], got {0}")]
    InvalidCpuFraction(f64),
    #[error("memory ceiling must be positive, got {0}")]
    InvalidMemory(f64),
    #[error("task name is empty")]
    EmptyName,
}
