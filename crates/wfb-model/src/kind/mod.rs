mod worker;
pub use worker::WorkerKind;

mod state;
pub use state::SupervisorState;
