//! # Handler
//!
//! The [`Handler`] is the application's side of a session: it is told how the
//! session progresses and how it ends, and it is asked for the user's
//! decisions.
//!
//! Decisions are returned through single-use callbacks. A [`PermissionHandler`]
//! or [`PinHandler`] is consumed when answered, so the same question cannot be
//! answered twice. Dropping a callback without answering it is the same as
//! declining.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::Error;
use crate::request::{
    Action, AttributeDisjunction, DisclosureChoice, DisclosureRequest, IssuanceRequest,
    SignatureRequest,
};

/// Progress of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Talking to the server.
    Communicating,

    /// The server's request has been received and is waiting on the user.
    Connected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Communicating => f.write_str("communicating"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

/// Callbacks through which a session informs and consults the application.
///
/// For every session, exactly one of `success`, `cancelled`, `failure` or
/// `unsatisfiable_request` is called, and nothing is called after it.
///
/// Implementations must not block: a permission or PIN request should be
/// handed to the user interface and answered later through its callback.
pub trait Handler: Send + Sync {
    /// The session has made progress.
    fn status_update(&self, action: Action, status: Status);

    /// The session completed successfully.
    fn success(&self, action: Action);

    /// The user declined the session.
    fn cancelled(&self, action: Action);

    /// The session failed.
    fn failure(&self, action: Action, err: Error);

    /// The user does not have attributes satisfying the listed requirements.
    fn unsatisfiable_request(&self, action: Action, missing: Vec<AttributeDisjunction>);

    /// Ask the user whether to receive the offered credentials.
    fn ask_issuance_permission(
        &self, request: IssuanceRequest, server_name: String, callback: PermissionHandler,
    );

    /// Ask the user whether to disclose attributes to the server.
    fn ask_verification_permission(
        &self, request: DisclosureRequest, server_name: String, callback: PermissionHandler,
    );

    /// Ask the user whether to sign the message with attributes.
    fn ask_signature_permission(
        &self, request: SignatureRequest, server_name: String, callback: PermissionHandler,
    );

    /// Ask the user for their keyshare PIN.
    fn ask_pin(&self, remaining_attempts: u32, callback: PinHandler);
}

/// The user's answer to a permission request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Permission {
    /// Go ahead, disclosing the chosen attributes.
    Granted(DisclosureChoice),

    /// Stop the session.
    Declined,
}

/// Single-use callback answering a permission request.
#[derive(Debug)]
pub struct PermissionHandler(oneshot::Sender<Permission>);

impl PermissionHandler {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Permission>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Answer the permission request. A grant without a choice discloses
    /// nothing.
    pub fn respond(self, proceed: bool, choice: Option<DisclosureChoice>) {
        if proceed {
            self.grant(choice.unwrap_or_default());
        } else {
            self.decline();
        }
    }

    /// Grant permission, disclosing the chosen attributes.
    pub fn grant(self, choice: DisclosureChoice) {
        // the receiver is gone only if the session already ended
        let _ = self.0.send(Permission::Granted(choice));
    }

    /// Decline the session.
    pub fn decline(self) {
        let _ = self.0.send(Permission::Declined);
    }
}

/// Single-use callback answering a PIN request.
#[derive(Debug)]
pub struct PinHandler(oneshot::Sender<String>);

impl PinHandler {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Supply the PIN entered by the user.
    pub fn submit(self, pin: impl Into<String>) {
        let _ = self.0.send(pin.into());
    }

    /// Abort PIN entry.
    pub fn abort(self) {
        drop(self);
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum Outcome {
    /// The server accepted the response.
    Success,

    /// The user declined.
    Cancelled,

    /// The user lacks attributes for the listed requirements.
    Unsatisfiable(Vec<AttributeDisjunction>),

    /// The session failed.
    Failure(Error),
}

impl Outcome {
    /// Report the outcome to the handler: the one terminal call of a session.
    pub fn report(self, handler: &dyn Handler, action: Action) {
        match self {
            Self::Success => handler.success(action),
            Self::Cancelled => handler.cancelled(action),
            Self::Unsatisfiable(missing) => handler.unsatisfiable_request(action, missing),
            Self::Failure(err) => {
                tracing::warn!(%action, "session failed: {err}");
                handler.failure(action, err);
            }
        }
    }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self {
        Self::Failure(err)
    }
}
