//! Error types for the collision engine

use thiserror::Error;

/// Errors reported by the collision engine
///
/// Configuration errors (bad thread count, malformed geometry, id
/// exhaustion) fail fast and are never retried. Capability gaps
/// ([`CollisionError::RemovalUnsupported`]) are explicit signals the caller
/// must check for, not silent no-ops.
#[derive(Debug, Error)]
pub enum CollisionError {
    /// Invalid worker thread count passed to the collision system
    #[error("invalid thread count {0}: must be at least 1")]
    InvalidThreadCount(usize),

    /// The worker thread pool could not be constructed
    #[error("failed to build worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A shape failed geometric validation at registration
    #[error("malformed shape geometry: {0}")]
    MalformedShape(String),

    /// No shape ids remain; the registry is full
    #[error("shape id space exhausted")]
    IdSpaceExhausted,

    /// Shape removal is not supported; the registry is append-only
    #[error("shape removal is not supported")]
    RemovalUnsupported,
}
