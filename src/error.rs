use std::io;

use thiserror::Error;

use crate::algorithm::AlgorithmKind;
use crate::message::{ChecksumField, CompletionCode};

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, OS, etc.).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// No matching response arrived before the caller's deadline.
    #[error("timeout waiting for response")]
    Timeout,

    /// Too few bytes to decode a structurally required field.
    ///
    /// The datagram was cut short; it is not necessarily corrupt.
    #[error("truncated: {0}")]
    Truncated(&'static str),

    /// A message checksum did not match its computed value.
    ///
    /// A conformant BMC drops such a message; it is never interpreted further.
    #[error("invalid {which}: got {actual:#04x}, want {expected:#04x}")]
    Checksum {
        /// Which of the two message checksums failed.
        which: ChecksumField,
        /// Value computed over the covered bytes.
        expected: u8,
        /// Value found on the wire.
        actual: u8,
    },

    /// An algorithm identifier this implementation cannot honor.
    #[error("unsupported {kind} algorithm {id:#04x}")]
    UnsupportedAlgorithm {
        /// Algorithm class.
        kind: AlgorithmKind,
        /// Raw identifier.
        id: u8,
    },

    /// A RAKP handshake authentication code or integrity check value failed.
    #[error("authentication failed: {0}")]
    Authentication(&'static str),

    /// A post-handshake message failed its integrity check.
    #[error("integrity check failed: {0}")]
    Integrity(&'static str),

    /// The managed system selected something outside what was offered.
    #[error("negotiation failed: {0}")]
    Negotiation(&'static str),

    /// The managed system rejected the Open Session Request.
    #[error("open session rejected by managed system (status {status:#04x})")]
    OpenSessionRejected {
        /// RMCP+ status code.
        status: u8,
    },

    /// Operation attempted on a session that is not active.
    #[error("session is closed")]
    SessionClosed,

    /// Peer responded with an unexpected or invalid packet.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Cryptographic failure (invalid key sizes, padding, etc.).
    #[error("crypto error: {0}")]
    Crypto(&'static str),

    /// Invalid caller-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An IPMI command completed with a non-normal completion code.
    #[error("ipmi completion code: {completion_code}")]
    CompletionCode {
        /// Completion code returned by the BMC.
        completion_code: CompletionCode,
    },
}

impl Error {
    /// Whether this error means a single inbound message was discarded.
    ///
    /// Such errors never tear down a session; the caller's request keeps
    /// waiting for a valid response until its deadline.
    pub fn is_dropped_message(&self) -> bool {
        matches!(
            self,
            Self::Truncated(_) | Self::Checksum { .. } | Self::Integrity(_)
        )
    }
}
