use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Cancel the returned token on SIGTERM or SIGINT.
///
/// # Errors
///
/// Fails if either signal handler cannot be installed.
pub fn install_shutdown_handler() -> Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, stopping agent");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, stopping agent");
            }
        }
        trigger.cancel();
    });

    Ok(token)
}
