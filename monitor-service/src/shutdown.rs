//! Graceful shutdown, adapted from the
//! teacher's `core/src/shutdown.rs` signal-waiting shape. A single
//! `tokio::sync::watch<bool>` travels to every worker (stream, aggregator,
//! validation loop) so each observes the same signal without a central
//! orchestrator owning their state; each worker tears down its own
//! resources (the stream deletes its listen key, the aggregator lets its
//! channel drain) once it sees the flag flip.

/// Resolves once either SIGINT or SIGTERM is observed, then flips
/// `signal` to `true` so every `watch::Receiver` clone wakes.
pub async fn wait_for_signal(signal: tokio::sync::watch::Sender<bool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            _ = sigint.recv() => tracing::info!("received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c");
    }

    let _ = signal.send(true);
}
