//! Signal listener that turns SIGINT/SIGTERM into an interrupt request

use std::io;

use fixprint_logs::InterruptFlag;

/// Spawn a task that sets `interrupt` on every SIGINT or SIGTERM
///
/// Must be called from within the tokio runtime.
#[cfg(unix)]
pub fn spawn_listener(interrupt: InterruptFlag) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = sigint.recv() => tracing::debug!("SIGINT received"),
                Some(()) = sigterm.recv() => tracing::debug!("SIGTERM received"),
                else => break,
            }
            interrupt.request();
        }
    });

    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_listener(interrupt: InterruptFlag) -> io::Result<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("ctrl-c received");
            interrupt.request();
        }
    });

    Ok(())
}
