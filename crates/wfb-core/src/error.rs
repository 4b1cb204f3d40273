use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid task: {0}")]
    InvalidTask(#[from] wfb_model::ModelError),

    #[error("core allocation failed: {0}")]
    Cores(#[from] wfb_cores::CoreRegistryError),

    #[error("worker launch failed: {0}")]
    Exec(#[from] wfb_exec::ExecError),
}
