use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("missing program")]
    MissingProgram,
    #[error("spawn of {program} failed: {reason}")]
    Spawn { program: String, reason: String },
    #[error("device query failed: {0}")]
    DeviceQuery(String),
    #[error("alternation signal closed")]
    SignalClosed,
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}
