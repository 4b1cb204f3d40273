use serde::{Deserialize, Serialize};

/// Phases a supervised task invocation moves through.
///
/// Optional phases are skipped when the task does not request the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupervisorState {
    Idle,
    CoreAcquired,
    IoStarted,
    AcceleratorStarted,
    ComputeStarted,
    Waiting,
    Terminating,
    CoreReleased,
    Done,
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Done)
    }

    /// Returns `true` while workers may still be running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SupervisorState::IoStarted
                | SupervisorState::AcceleratorStarted
                | SupervisorState::ComputeStarted
                | SupervisorState::Waiting
        )
    }
}
