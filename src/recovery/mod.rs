//! Failure detection and recovery for worker nodes.
//!
//! Per node: `Healthy -> Reported -> Recovering`, then either back to
//! `Healthy` or, when recovery fails, `Drained` with every assigned task
//! moved back into the shared task queue. Drained tasks keep their retry
//! count and re-enter the dispatcher's normal pending path.

pub mod manager;
pub mod probe;

pub use manager::{FailureRecoveryManager, RecoveryOutcome, RecoveryReport};
pub use probe::{RecoverabilityFlag, RecoveryProbe};
