use thiserror::Error;

#[derive(Error, Debug)]
pub enum PowerflowError {
    #[error("Invalid capacity {capacity} for node {node_id}: must be greater than zero")]
    InvalidCapacity { node_id: String, capacity: u32 },

    #[error("Invalid task {task_id}: required capacity must be greater than zero")]
    InvalidTask { task_id: String },

    #[error("No node with {required} available capacity for task {task_id}")]
    NoNodeAvailable { task_id: String, required: u32 },

    #[error("Node {node_id} lost the reservation race for task {task_id}")]
    ReservationLost { task_id: String, node_id: String },

    #[error("Task {task_id} dropped after {retries} retries")]
    RetriesExhausted { task_id: String, retries: u32 },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Releasing {amount} on node {node_id} would exceed its total capacity")]
    CapacityOverflow { node_id: String, amount: u32 },

    #[error("Agent is already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PowerflowError>;
