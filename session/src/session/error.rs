use std::io;

use thiserror::Error;

/// Errors that can end a session before it starts.
///
/// Everything after creation follows the wire policy of failing quiet:
/// malformed frames, stale acks, and transient socket errors are
/// dropped or logged, never returned.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The UDP socket could not be bound to the requested address.
    #[error("failed to bind the session socket: {0}")]
    Bind(#[source] io::Error),
}
