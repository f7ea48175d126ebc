//! Signal-driven shutdown
//!
//! SIGINT and SIGTERM flip a `watch` flag that the processing loop and the
//! simulated producer observe once per iteration.

use tokio::sync::watch;
use tracing::{info, warn};

/// Resolves on the first SIGINT (Ctrl-C) or, on Unix, SIGTERM
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received interrupt"),
        _ = terminate => info!("received terminate signal"),
    }
}

/// Shutdown flag driven by `trigger`; the sender lives in a background task
pub fn shutdown_channel<F>(trigger: F) -> watch::Receiver<bool>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        trigger.await;
        let _ = tx.send(true);
        // Keep the sender alive until every receiver has seen the flag
        tx.closed().await;
    });
    rx
}
