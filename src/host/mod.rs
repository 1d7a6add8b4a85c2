//! Host module for supervising the backing proxy process

pub mod output_ring;
pub mod supervisor;

pub use supervisor::{ExitReport, ProcessConfig, ProxySupervisor, SupervisorError, SupervisorState};
