use crate::cluster::WorkerNode;

/// Decides whether a recovery attempt on a node succeeds.
pub trait RecoveryProbe: Send + Sync {
    fn attempt(&self, node: &WorkerNode) -> bool;
}

/// Succeeds for nodes whose `recoverable` flag is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverabilityFlag;

impl RecoveryProbe for RecoverabilityFlag {
    fn attempt(&self, node: &WorkerNode) -> bool {
        node.is_recoverable()
    }
}

impl<F> RecoveryProbe for F
where
    F: Fn(&WorkerNode) -> bool + Send + Sync,
{
    fn attempt(&self, node: &WorkerNode) -> bool {
        self(node)
    }
}
