//! Bounded external calls, with a single retry where a retry can help

use crate::config::EngineConfig;
use crate::error::EngineError;
use std::future::Future;

/// Retries after the first transient failure
const MAX_RETRIES: u32 = 1;

fn timed_out(config: &EngineConfig, operation: &'static str) -> EngineError {
    EngineError::transient(operation, format!("timed out after {:?}", config.io_timeout()))
}

/// Run `fut` once under the I/O timeout. A timeout is transient; any other
/// error passes through unchanged.
pub(crate) async fn once<T, E, Fut>(config: &EngineConfig, operation: &'static str, fut: Fut) -> Result<T, EngineError>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<EngineError>,
{
    match tokio::time::timeout(config.io_timeout(), fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(timed_out(config, operation)),
    }
}

/// Run `op` under the I/O timeout, retrying once after backoff if the
/// failure is transient. Non-transient errors return immediately.
pub(crate) async fn bounded<T, F, Fut>(config: &EngineConfig, operation: &'static str, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut retries = 0;
    loop {
        let outcome = match tokio::time::timeout(config.io_timeout(), op()).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(config, operation)),
        };
        match outcome {
            Err(err) if err.is_retryable() && retries < MAX_RETRIES => {
                retries += 1;
                tracing::warn!(operation, error = %err, "transient failure, retrying");
                tokio::time::sleep(config.retry_backoff()).await;
            }
            other => return other,
        }
    }
}
