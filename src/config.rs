use std::net::SocketAddr;
use std::time::Duration;

/// Dispatcher loop tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long the loop idles when the task queue is empty
    pub poll_interval_ms: u64,
    /// Number of re-enqueues a task gets before it is dropped
    pub max_retries: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_retries: 3,
        }
    }
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Failure recovery supervisor tuning.
///
/// Performance indicators are percentages in `0..=100`. A node whose
/// indicator drops below `optimal_performance` is reported as failed by
/// the periodic scan.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Run the supervisor loop (monitor + process) alongside the dispatcher.
    pub enabled: bool,
    pub scan_interval_ms: u64,
    /// Threshold applied to newly registered nodes.
    pub optimal_performance: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ms: 1000,
            optimal_performance: 80,
        }
    }
}

impl RecoveryConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub dispatcher: DispatcherConfig,
    pub recovery: RecoveryConfig,
    /// Serve the HTTP dashboard on this address when set.
    pub dashboard_addr: Option<SocketAddr>,
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dashboard(mut self, addr: SocketAddr) -> Self {
        self.dashboard_addr = Some(addr);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.dispatcher.max_retries = max_retries;
        self
    }

    pub fn without_recovery(mut self) -> Self {
        self.recovery.enabled = false;
        self
    }
}
