use std::io;
use thiserror::Error;

use crate::pdu::{status_name, CodecError};

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SmppError {
    /// The session is not in the Connected state.
    #[error("not connected")]
    NotConnected,

    /// Bind attempted on a session that is already connecting or bound.
    #[error("already bound")]
    AlreadyBound,

    /// The SMSC rejected the bind; carries the response `command_status`.
    #[error("bind rejected: {}", status_name(*.0))]
    BindFailed(u32),

    /// The in-flight window is full; the request was not sent.
    #[error("maximum window size reached")]
    MaxWindowSize,

    /// No response within the per-request deadline. The session stays
    /// healthy; a late response is dropped as an orphan.
    #[error("timed out waiting for response")]
    Timeout,

    /// The session went away while this call was waiting to send.
    #[error("request cancelled")]
    Cancelled,

    /// A field failed validation or parsing.
    #[error("malformed field '{field}': {reason}")]
    Malformed { field: &'static str, reason: String },

    /// Transport failure; the session is closed.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// The peer answered with a non-zero `command_status`.
    #[error("SMSC returned {}", status_name(*.0))]
    Smpp(u32),
}

pub type SmppResult<T> = Result<T, SmppError>;

impl From<CodecError> for SmppError {
    fn from(err: CodecError) -> SmppError {
        match err {
            CodecError::Malformed { field, reason } => SmppError::Malformed { field, reason },
            CodecError::Io(inner) => SmppError::Io(inner),
            other => SmppError::Io(io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
        }
    }
}
