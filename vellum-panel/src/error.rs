//! Panel errors.

use thiserror::Error;

/// Errors surfaced by the panel layer.
///
/// Most rendering problems degrade silently; what remains here are
/// lifecycle misuses that a caller can act on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// The requested page number is out of range.
    #[error("page {0} does not exist")]
    PageOutOfRange(usize),
    /// The target cache entry was already disposed.
    #[error("the cache entry for page {0} is disposed")]
    Disposed(u32),
    /// The rendering queue was shut down.
    #[error("the rendering queue is shut down")]
    QueueShutDown,
}
