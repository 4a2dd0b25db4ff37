pub mod node;
pub mod registry;

pub use node::{NodeHealth, NodeSnapshot, WorkerNode, FULL_PERFORMANCE};
pub use registry::NodeRegistry;
