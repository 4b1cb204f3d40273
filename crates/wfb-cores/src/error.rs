use std::path::PathBuf;

use thiserror::Error;

use wfb_model::CoreId;

pub type CoreResult<T> = Result<T, CoreRegistryError>;

#[derive(Error, Debug)]
pub enum CoreRegistryError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("host reports no hardware threads")]
    NoCores,
    #[error("core {0} is outside of the host range")]
    OutOfRange(CoreId),
    #[error("no core became free within {0:?}")]
    Timeout(std::time::Duration),
    #[error("core acquisition cancelled")]
    Cancelled,
    #[error("registry worker failed: {0}")]
    Join(String),
}

impl CoreRegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreRegistryError::Io {
            path: path.into(),
            source,
        }
    }
}
