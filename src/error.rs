//! Error types for the S7 client.
//!
//! Every failure is classified by cause so callers can tell a local input
//! mistake from a controller rejection, a broken connection or an expired
//! wait. Each variant also carries a 32-bit status code that can be turned
//! into text with [`error_text`](crate::status::error_text).

use std::io;
use thiserror::Error;

use crate::status::{
    self, CLI_FUNCTION_NOT_IMPLEMENTED, CLI_JOB_TIMEOUT, TCP_CONNECTION_FAILED,
    TCP_CONNECTION_RESET, TCP_CONNECTION_TIMEOUT, TCP_DATA_RECEIVE, TCP_NOT_CONNECTED,
    TCP_RECEIVE_TIMEOUT, TCP_UNREACHABLE_HOST,
};

/// Result type alias for S7 operations.
pub type Result<T> = std::result::Result<T, S7Error>;

/// Errors that can occur while talking to an S7 controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum S7Error {
    /// Input rejected locally; no network exchange was attempted.
    #[error("Validation error: {reason}")]
    Validation {
        /// Status code describing the rejection.
        code: u32,
        /// Description of what was wrong with the input.
        reason: String,
    },

    /// The controller rejected the request.
    #[error("{}", status::error_text_of(.code))]
    Protocol {
        /// Client status code translated from the controller's answer.
        code: u32,
    },

    /// The session password was required and rejected.
    #[error("Authentication failed: {}", status::error_text_of(.code))]
    Auth {
        /// Status code returned for the password exchange.
        code: u32,
    },

    /// Transport level failure; the connection is no longer usable.
    #[error("Connection error: {reason}")]
    Connection {
        /// TCP/ISO status code.
        code: u32,
        /// Description of the failure.
        reason: String,
    },

    /// A wait on an asynchronous job expired before the job finished.
    #[error("CLI : Job Timeout")]
    Timeout,

    /// The function exists in the protocol but this client does not support it.
    #[error("Function not implemented: {function}")]
    Unsupported {
        /// Name of the unsupported function.
        function: &'static str,
    },
}

impl S7Error {
    /// Creates a new `Validation` error.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::{status, S7Error};
    ///
    /// let err = S7Error::validation(status::CLI_INVALID_PARAMS, "amount must be greater than 0");
    /// assert_eq!(err.to_string(), "Validation error: amount must be greater than 0");
    /// ```
    pub fn validation(code: u32, reason: impl Into<String>) -> Self {
        Self::Validation {
            code,
            reason: reason.into(),
        }
    }

    /// Creates a new `Protocol` error from a client status code.
    pub fn protocol(code: u32) -> Self {
        Self::Protocol { code }
    }

    /// Creates a new `Connection` error.
    pub fn connection(code: u32, reason: impl Into<String>) -> Self {
        Self::Connection {
            code,
            reason: reason.into(),
        }
    }

    /// Creates the error returned when an operation needs an open connection.
    pub fn not_connected() -> Self {
        Self::connection(TCP_NOT_CONNECTED, "client is not connected")
    }

    /// Returns the 32-bit status code of this error.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::{status, S7Error};
    ///
    /// assert_eq!(S7Error::Timeout.code(), status::CLI_JOB_TIMEOUT);
    /// ```
    pub fn code(&self) -> u32 {
        match self {
            S7Error::Validation { code, .. }
            | S7Error::Protocol { code }
            | S7Error::Auth { code }
            | S7Error::Connection { code, .. } => *code,
            S7Error::Timeout => CLI_JOB_TIMEOUT,
            S7Error::Unsupported { .. } => CLI_FUNCTION_NOT_IMPLEMENTED,
        }
    }

    /// Returns whether this error means the connection was lost.
    pub fn is_connection(&self) -> bool {
        matches!(self, S7Error::Connection { .. })
    }
}

impl From<io::Error> for S7Error {
    fn from(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TCP_RECEIVE_TIMEOUT,
            io::ErrorKind::ConnectionRefused => TCP_CONNECTION_FAILED,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TCP_CONNECTION_RESET,
            io::ErrorKind::NotConnected => TCP_NOT_CONNECTED,
            io::ErrorKind::AddrNotAvailable => TCP_UNREACHABLE_HOST,
            _ => TCP_DATA_RECEIVE,
        };
        Self::connection(code, err.to_string())
    }
}

/// Maps a failed TCP connect attempt, where a timeout means the peer never answered.
pub(crate) fn connect_error(err: io::Error) -> S7Error {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            S7Error::connection(TCP_CONNECTION_TIMEOUT, err.to_string())
        }
        _ => S7Error::from(err),
    }
}
