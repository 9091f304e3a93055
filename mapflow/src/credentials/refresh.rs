//! Background token rotation.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::TokenCredential;
use crate::aborter::Aborter;

/// Spawns a task that refreshes `credential` every `interval` (plus up to 10%
/// jitter) by calling `fetch`.
///
/// A fetch failure or an empty token keeps the previous token and is retried
/// on the next tick. The task ends once `aborter` is aborted; pipelines using
/// the credential pick up each new token on their next signing pass.
pub fn spawn_token_refresh<F, Fut>(
    credential: TokenCredential,
    interval: Duration,
    aborter: Aborter,
    fetch: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let wait = interval + jitter(interval);
            tokio::select! {
                () = aborter.aborted() => break,
                () = tokio::time::sleep(wait) => {}
            }

            match fetch().await {
                Ok(token) => {
                    if token == credential.token() {
                        debug!("Token unchanged after refresh");
                        continue;
                    }
                    match credential.set_token(token) {
                        Ok(()) => info!(client_id = %credential.client_id(), "Token rotated"),
                        Err(err) => warn!(error = %err, "Refreshed token rejected (will retry)"),
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Failed to refresh token (will retry)");
                }
            }
        }
        debug!("Token refresh stopped");
    })
}

fn jitter(interval: Duration) -> Duration {
    let max_ms = u64::try_from(interval.as_millis() / 10).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let ms = {
        use rand::Rng;
        rand::thread_rng().gen_range(0..=max_ms)
    };
    Duration::from_millis(ms)
}
