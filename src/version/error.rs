use thiserror::Error;

/// Failure talking to the registry.
///
/// Every variant is transient from the cache's point of view: none of them
/// may be memoized, so the next scan pass retries from scratch. A confirmed
/// 404 is not an error (it is a stable `None`/empty answer).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
