use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use wfb_model::{CoreId, SupervisorState, WorkerKind};

/// Summary of one supervised task invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub task: String,
    pub core: Option<CoreId>,
    pub states: Vec<SupervisorState>,
    pub workers: BTreeMap<WorkerKind, usize>,
    pub io_cycles: u64,
    pub deadline_hit: bool,
    pub cancelled: bool,
    /// Workers that ignored SIGTERM past the grace period.
    pub forced_kills: usize,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub(crate) fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            core: None,
            states: vec![SupervisorState::Idle],
            workers: BTreeMap::new(),
            io_cycles: 0,
            deadline_hit: false,
            cancelled: false,
            forced_kills: 0,
            elapsed_ms: 0,
        }
    }

    pub(crate) fn enter(&mut self, state: SupervisorState) {
        debug!(target: "wfb.core.supervisor", task = %self.task, ?state, "state transition");
        self.states.push(state);
    }

    pub fn state(&self) -> SupervisorState {
        self.states.last().copied().unwrap_or(SupervisorState::Idle)
    }

    pub fn visited(&self, state: SupervisorState) -> bool {
        self.states.contains(&state)
    }

    pub fn launched(&self, kind: WorkerKind) -> usize {
        self.workers.get(&kind).copied().unwrap_or(0)
    }
}
