use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use powerflow::agent::Agent;
use powerflow::config::{AgentConfig, DispatcherConfig, RecoveryConfig};
use powerflow::dashboard::{run_dashboard, DashboardState};
use powerflow::scheduler::Task;
use powerflow::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "powerflow")]
#[command(version)]
#[command(about = "Capacity-aware task dispatcher with node failure recovery")]
struct Args {
    /// Worker node to register, as "id:capacity" (repeatable)
    #[arg(long = "node", value_parser = parse_node)]
    nodes: Vec<(String, u32)>,

    /// Task to enqueue, as "id:capacity:millis" (repeatable)
    #[arg(long = "task", value_parser = parse_task)]
    tasks: Vec<Task>,

    /// Port for the HTTP dashboard (optional)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Idle time between polls of an empty task queue
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Re-enqueues allowed before a task is dropped
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Interval between performance scans and recovery passes
    #[arg(long, default_value = "1000")]
    recovery_interval_ms: u64,

    /// Performance percentage below which a node is reported as failed
    #[arg(long, default_value = "80")]
    optimal_performance: u32,

    /// Do not run the recovery supervisor; failure reports then wait for
    /// POST /api/recovery
    #[arg(long)]
    no_recovery: bool,
}

fn parse_node(s: &str) -> Result<(String, u32), String> {
    let (id, capacity) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected id:capacity, got '{}'", s))?;
    let capacity = capacity
        .parse()
        .map_err(|e| format!("invalid capacity in '{}': {}", s, e))?;
    Ok((id.to_string(), capacity))
}

fn parse_task(s: &str) -> Result<Task, String> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(millis), Some(capacity), Some(id)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected id:capacity:millis, got '{}'", s));
    };
    let capacity = capacity
        .parse()
        .map_err(|e| format!("invalid capacity in '{}': {}", s, e))?;
    let millis = millis
        .parse()
        .map_err(|e| format!("invalid duration in '{}': {}", s, e))?;
    Ok(Task::new(id, capacity, millis))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let dashboard_addr: Option<SocketAddr> = match args.dashboard_port {
        Some(p) => Some(format!("0.0.0.0:{}", p).parse()?),
        None => None,
    };

    let config = AgentConfig {
        dispatcher: DispatcherConfig {
            poll_interval_ms: args.poll_interval_ms,
            max_retries: args.max_retries,
        },
        recovery: RecoveryConfig {
            enabled: !args.no_recovery,
            scan_interval_ms: args.recovery_interval_ms,
            optimal_performance: args.optimal_performance,
        },
        dashboard_addr,
    };

    let agent = Arc::new(Agent::new(config));

    for (id, capacity) in &args.nodes {
        agent.register_node(id, *capacity).await?;
    }
    for task in args.tasks {
        agent.enqueue_task(task).await?;
    }

    let shutdown = install_shutdown_handler()?;
    agent.start().await?;

    let dashboard = agent.config.dashboard_addr.map(|addr| {
        let state = DashboardState {
            agent: agent.clone(),
        };
        let token = shutdown.clone();
        tokio::spawn(async move {
            run_dashboard(addr, state, token).await;
        })
    });

    shutdown.cancelled().await;

    agent.stop().await;
    if let Some(handle) = dashboard {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Dashboard task failed");
        }
    }

    let snapshot = agent.snapshot().await;
    tracing::info!(
        assigned = snapshot.stats.assigned,
        completed = snapshot.stats.completed,
        dropped = snapshot.stats.dropped,
        "{}",
        snapshot.status_line()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_node_keeps_colons_in_id() {
        assert_eq!(parse_node("rack:1:100").unwrap(), ("rack:1".to_string(), 100));
        assert!(parse_node("A").is_err());
        assert!(parse_node("A:lots").is_err());
    }

    #[test]
    fn parse_task_keeps_colons_in_id() {
        let task = parse_task("job:7:25:1500").unwrap();
        assert_eq!(task.id, "job:7");
        assert_eq!(task.required_capacity, 25);
        assert_eq!(task.execution_time_ms, 1500);

        let task = parse_task("T1:60:1000").unwrap();
        assert_eq!(task.id, "T1");
    }

    #[test]
    fn parse_task_rejects_malformed_input() {
        assert!(parse_task("T1:60").is_err());
        assert!(parse_task("T1:sixty:1000").is_err());
        assert!(parse_task("T1:60:soon").is_err());
    }
}
