//! Coordination client error types.

use thiserror::Error;

/// Errors surfaced by a [`crate::CoordinationClient`].
///
/// Transient faults (a blip in the ensemble connection) are retried
/// internally by [`crate::retry::retry_transient`] and never reach the
/// caller; only a fatal condition — the ensemble unreachable past the
/// configured session timeout, or a deadline exceeded while waiting on a
/// lock/permit — is surfaced here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// The ensemble could not be reached within the session timeout. Callers
    /// (notably the command executor) treat this as fatal and enter
    /// read-only mode.
    #[error("coordination ensemble unreachable: {0}")]
    Unavailable(String),

    /// A lock or permit acquisition exceeded its deadline.
    #[error("deadline exceeded waiting on {0}")]
    DeadlineExceeded(String),

    /// The referenced path does not exist.
    #[error("no such node: {0}")]
    NoNode(String),

    /// A sequential/persistent node already exists at this path.
    #[error("node already exists: {0}")]
    NodeExists(String),
}
