pub mod dispatcher;
pub mod queue;
pub mod task;

pub use dispatcher::{select_node, DispatchOutcome, DispatchStats, DispatchStatsSnapshot, Dispatcher};
pub use queue::TaskQueue;
pub use task::{Task, TaskState};
