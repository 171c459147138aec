use common::domain::{DomainError, DomainResult};
use std::future::Future;
use std::time::Duration;

/// Await a remote call, failing with `UpstreamTimeout` once `limit` elapses
pub(crate) async fn call_with_timeout<T, F>(
    limit: Duration,
    operation: &str,
    call: F,
) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DomainError::UpstreamTimeout(format!(
            "{operation} after {}ms",
            limit.as_millis()
        ))),
    }
}
