pub mod agent;
pub mod cluster;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod recovery;
pub mod scheduler;
pub mod shutdown;
pub mod status;
pub mod worker;
