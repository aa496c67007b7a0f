//! Error types for the deployment store.

/// The distinguished error kinds callers may need to match on, plus
/// pass-through wrappers for the lower layers.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The requested ref has no deployment at all, or not at the given checksum.
    #[error("not deployed: {0}")]
    NotDeployed(String),

    /// A deploy was requested for a checksum that is already checked out.
    #[error("already deployed: {0}")]
    AlreadyDeployed(String),

    /// An undeploy was requested for a checksum that has already been removed.
    #[error("already undeployed: {0}")]
    AlreadyUndeployed(String),

    /// An underlying I/O failure.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// An underlying HTTP/network failure.
    #[error("network error")]
    Http(#[from] reqwest::Error),

    /// A remote object or resource does not exist (HTTP 404/410, or a
    /// named entry absent from a parsed tree).
    #[error("not found: {0}")]
    NotFound(String),

    /// A remote fetch failed for a reason other than not-found (a non-2xx
    /// status, an unsupported URI scheme, or a malformed object).
    #[error("failed: {0}")]
    Failed(String),

    /// An error surfaced by the object-store backend.
    #[error("repository error")]
    Backend(#[source] anyhow::Error),

    /// Anything else, preserving the original chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the crate's public surface.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Wrap an arbitrary backend failure, tagging it so callers can tell
    /// it apart from a plain [`StoreError::Other`] if they care to.
    pub fn backend(e: impl Into<anyhow::Error>) -> Self {
        StoreError::Backend(e.into())
    }
}
