use tokio::select;
use tokio_util::sync::CancellationToken;

/// Waits for ctrl-c or for someone else to cancel `cancelation`. Ctrl-c cancels the
/// token so every task sharing it winds down.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
