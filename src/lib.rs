//! # Credibil Session
//!
//! An SDK for the holder's side of attribute-based credential sessions. A
//! server (a verifier, a party requesting a signature, or an issuer) starts a
//! session, usually by showing a QR code, and the holder's agent (such as a
//! wallet) uses this crate to drive that session to its end: disclosing
//! attributes, signing a message with them, or receiving new credentials.
//! Nothing beyond what the server asked for, and the user agreed to, is
//! revealed.
//!
//! The crate does not provide a user interface or store credentials - that is
//! the job of an application implementer.
//!
//! # Design
//!
//! ** Session **
//!
//! A session is started with [`session::start`] and then runs on its own,
//! as a sequence of background tasks on the Tokio runtime:
//!
//! ```text
//! negotiate version -> decode request -> check satisfiability
//!     -> ask permission -> compute proofs (locally or with keyshare server)
//!     -> submit to server
//! ```
//!
//! The application follows along through a [`handler::Handler`]: it receives
//! status updates, answers permission and PIN requests, and is told how the
//! session ended. Exactly one of `success`, `cancelled`, `failure` or
//! `unsatisfiable_request` is called for every session.
//!
//! ** Provider **
//!
//! In a similar style to `credibil-holder`, implementors make use of
//! 'Provider' traits that are responsible for network transport, access to
//! the user's credentials and the proof system, and the keyshare protocol.
//! See the [`provider`] module.
//!
//! ** Requests **
//!
//! The three kinds of session request are distinct types, gathered in
//! [`request::SessionRequest`]. Each request is decoded strictly according to
//! the kind of session the server announced.
//!
//! # Example
//!
//! See the `tests` directory for an in-memory provider and handler that drive
//! complete disclosure, signature and issuance sessions.

pub mod config;
pub mod error;
pub mod handler;
pub mod identifier;
pub mod jwt;
pub mod proof;
pub mod provider;
pub mod request;
pub mod response;
pub mod session;
pub mod version;

pub use config::Config;
pub use error::{Error, Result};
pub use handler::{Handler, Outcome, PermissionHandler, PinHandler, Status};
pub use request::{Action, DisclosureChoice, SessionRequest};
pub use session::{start, Qr};
pub use version::{SupportedVersions, Version};
