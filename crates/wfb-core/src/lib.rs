pub mod error;
pub use error::SupervisorError;

mod config;
pub use config::SupervisorConfig;

mod report;
pub use report::RunReport;

pub mod supervisor;
pub use supervisor::Supervisor;
