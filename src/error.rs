//! # Session Errors
//!
//! Every fatal condition a session can run into. Each variant is reported to
//! the [`Handler`](crate::handler::Handler) exactly once, through
//! `Handler::failure`.
//!
//! The non-fatal ways a session can end (the user declining, or the request
//! asking for attributes the holder does not have) are not errors and have no
//! variant here. See [`Outcome`](crate::handler::Outcome).

use thiserror::Error;

/// Result type for session operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Session error.
#[derive(Debug, Error)]
pub enum Error {
    /// There is no protocol version both this client and the server support.
    #[error("no supported protocol version between {min} and {max}")]
    UnsupportedVersion {
        /// Minimum version requested by the server, verbatim.
        min: String,

        /// Maximum version requested by the server, verbatim.
        max: String,
    },

    /// The session action is not one of disclosing, signing or issuing.
    #[error("unknown session action: {0:?}")]
    UnknownAction(String),

    /// The server URL could not be parsed.
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The signed session request could not be decoded for the session's
    /// action.
    #[error("invalid session token: {0}")]
    InvalidToken(#[source] anyhow::Error),

    /// A proof, commitment or credential could not be computed.
    #[error("cryptographic failure: {0}")]
    Crypto(#[source] anyhow::Error),

    /// The keyshare server has temporarily blocked the user.
    #[error("keyshare server blocked for {duration} seconds")]
    KeyshareBlocked {
        /// Lockout duration in seconds.
        duration: u64,
    },

    /// The keyshare protocol failed.
    #[error("keyshare failure: {0}")]
    Keyshare(#[source] anyhow::Error),

    /// The server did not accept the submitted proofs. Holds the server's
    /// literal verdict.
    #[error("server rejected proofs: {0:?}")]
    Rejected(String),

    /// The transport failed. The transport's error is carried as is.
    #[error(transparent)]
    Transport(anyhow::Error),
}
