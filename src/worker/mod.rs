//! Execution bookkeeping for tasks running on worker nodes.
//!
//! Execution is simulated: a task occupies its required capacity on the
//! chosen node for its execution time, then the capacity is released.
//!
//! # Execution Flow
//!
//! 1. The dispatcher picks a node and calls [`ExecutionTracker::execute`]
//! 2. The node's capacity is reserved with an atomic check-and-subtract
//! 3. The task is recorded on the node under a ticket
//! 4. A release is scheduled after the task's execution time
//! 5. On release the ticket is removed and the capacity returned, unless the
//!    node was drained in the meantime
//!
//! Many tasks can be in flight on one node at once; the reservation/release
//! pair keeps their summed capacity within the node's total.

pub mod tracker;

pub use tracker::{ExecutionTracker, Reservation, ReservationFailed};
