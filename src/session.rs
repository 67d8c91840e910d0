//! # Session
//!
//! A session is one interaction with a server: the holder discloses
//! attributes, signs a message with them, or receives new credentials.
//!
//! [`start`] checks the session parameters and then hands the session to a
//! chain of background tasks, one per phase:
//!
//! 1. **Request** fetches and decodes the server's request, checks that the
//!    user can satisfy it, and asks the user for permission.
//! 2. **Permitted** waits for the user's decision and computes the proofs or
//!    commitments, locally or with the keyshare server.
//! 3. **Respond** submits the result to the server.
//!
//! Each phase consumes the session produced by the one before it, so session
//! state is only ever owned by one task. Every phase either starts the next
//! or reports how the session ended to the [`Handler`], exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Number;
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler::{Handler, Outcome, Permission, PermissionHandler, Status};
use crate::identifier::IssuerIdentifier;
use crate::jwt::{self, Decoded};
use crate::provider::{PinRelay, ProofMessage, Provider};
use crate::request::{Action, DisclosureChoice, SessionRequest};
use crate::version::{Version, VersionRange};
use crate::{proof, response};

/// Endpoint serving the session information.
pub const SESSION_INFO: &str = "jwt";

/// Parameters for starting a session, usually scanned from a QR code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Qr {
    /// Session server URL.
    #[serde(rename = "u")]
    pub url: String,

    /// Session type: `disclosing`, `signing` or `issuing`.
    #[serde(rename = "irmaqr")]
    pub session_type: String,

    /// Lowest protocol version the server speaks.
    #[serde(rename = "v")]
    pub protocol_version: String,

    /// Highest protocol version the server speaks.
    #[serde(rename = "vmax")]
    pub protocol_max_version: String,
}

impl Qr {
    /// The session action.
    #[must_use]
    pub fn action(&self) -> Action {
        self.session_type.parse().unwrap_or_default()
    }
}

/// The first message of a session: the signed request and the values the
/// server binds it to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionInfo {
    /// Signed session request.
    pub jwt: String,

    /// Session nonce.
    pub nonce: Number,

    /// Session context.
    pub context: Number,

    /// Key counter of the public key each issuer will use, for issuance.
    #[serde(default)]
    pub keys: HashMap<IssuerIdentifier, u32>,
}

/// Start a session.
///
/// Version negotiation and the session type are checked before anything
/// else; if either fails the handler's `failure` is called before this
/// function returns. Otherwise the session continues in the background and
/// the handler is kept informed from there.
///
/// Returns an identifier for the session, used in its log records.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn start<P: Provider>(qr: &Qr, config: &Config, provider: P, handler: Arc<dyn Handler>) -> Uuid {
    let id = Uuid::new_v4();
    let action = qr.action();

    let version = match VersionRange::parse(&qr.protocol_version, &qr.protocol_max_version)
        .and_then(|range| config.supported_versions.negotiate(&range))
    {
        Ok(version) => version,
        Err(err) => {
            Outcome::from(err).report(handler.as_ref(), action);
            return id;
        }
    };

    match action {
        Action::Disclosing | Action::Signing | Action::Issuing => {}
        Action::Unknown => {
            let err = Error::UnknownAction(qr.session_type.clone());
            Outcome::from(err).report(handler.as_ref(), Action::Unknown);
            return id;
        }
    }

    let server_url = match server_url(&qr.url) {
        Ok(url) => url,
        Err(err) => {
            Outcome::from(err).report(handler.as_ref(), action);
            return id;
        }
    };

    tracing::debug!(session = %id, %action, %version, %server_url, "starting session");
    let session = Session {
        id,
        action,
        version,
        server_url,
        provider,
        handler,
        state: Connecting,
    };
    tokio::spawn(session.run());
    id
}

// Endpoint names are joined onto the server URL, so it must end in a slash.
fn server_url(url: &str) -> Result<Url> {
    let mut url = url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    Ok(Url::parse(&url)?)
}

/// Session state before the server's request has been received.
#[derive(Debug)]
struct Connecting;

/// Session state once the server's request has been decoded.
#[derive(Debug)]
struct Requested {
    server_name: String,
    request: SessionRequest,
}

/// Session state once the user has granted permission.
#[derive(Debug)]
struct Permitted {
    request: SessionRequest,
    choice: DisclosureChoice,
}

/// A session in phase `S`. Action, version and server are fixed for the life
/// of the session.
struct Session<P, S> {
    id: Uuid,
    action: Action,
    version: Version,
    server_url: Url,
    provider: P,
    handler: Arc<dyn Handler>,
    state: S,
}

impl<P, S> Session<P, S> {
    fn advance<T>(self, next: impl FnOnce(S) -> T) -> Session<P, T> {
        Session {
            id: self.id,
            action: self.action,
            version: self.version,
            server_url: self.server_url,
            provider: self.provider,
            handler: self.handler,
            state: next(self.state),
        }
    }

    fn finish(&self, outcome: Outcome) {
        tracing::debug!(session = %self.id, action = %self.action, ?outcome, "session ended");
        outcome.report(self.handler.as_ref(), self.action);
    }
}

impl<P: Provider> Session<P, Connecting> {
    async fn run(self) {
        let (id, action, handler) = (self.id, self.action, Arc::clone(&self.handler));
        match self.request().await {
            Ok(session) => session.ask_permission(),
            Err(outcome) => {
                tracing::debug!(session = %id, %action, ?outcome, "session ended");
                outcome.report(handler.as_ref(), action);
            }
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(session = %self.id, action = %self.action))]
    async fn request(self) -> Result<Session<P, Requested>, Outcome> {
        self.handler.status_update(self.action, Status::Communicating);

        let url = self.server_url.join(SESSION_INFO).map_err(Error::from)?;
        let info: SessionInfo =
            self.provider.get(&url, self.version).await.map_err(Error::Transport)?;

        let Decoded {
            server_name,
            mut request,
        } = jwt::decode(self.action, &info.jwt)?;
        request.bind(info.context, info.nonce, &info.keys);
        tracing::debug!(%server_name, "decoded session request");

        let missing = self.provider.check_satisfiability(request.disjunctions());
        if !missing.is_empty() {
            return Err(Outcome::Unsatisfiable(missing));
        }

        Ok(self.advance(|Connecting| Requested {
            server_name,
            request,
        }))
    }
}

impl<P: Provider> Session<P, Requested> {
    // The user's decision is awaited by a new task; the handler is free to
    // answer from any thread, now or later.
    fn ask_permission(self) {
        let (callback, decision) = PermissionHandler::channel();
        self.handler.status_update(self.action, Status::Connected);

        let Requested {
            server_name,
            request,
        } = &self.state;
        let server_name = server_name.clone();
        match request {
            SessionRequest::Disclosing(request) => {
                self.handler.ask_verification_permission(request.clone(), server_name, callback);
            }
            SessionRequest::Signing(request) => {
                self.handler.ask_signature_permission(request.clone(), server_name, callback);
            }
            SessionRequest::Issuing(request) => {
                self.handler.ask_issuance_permission(request.clone(), server_name, callback);
            }
        }

        tokio::spawn(self.permitted(decision));
    }

    async fn permitted(self, decision: oneshot::Receiver<Permission>) {
        let choice = match decision.await {
            Ok(Permission::Granted(choice)) => choice,
            Ok(Permission::Declined) | Err(_) => return self.finish(Outcome::Cancelled),
        };
        self.advance(|Requested { request, .. }| Permitted { request, choice }).compute().await;
    }
}

impl<P: Provider> Session<P, Permitted> {
    #[tracing::instrument(level = "debug", skip_all, fields(session = %self.id, action = %self.action))]
    async fn compute(self) {
        self.handler.status_update(self.action, Status::Communicating);

        let pin = PinRelay::new(Arc::clone(&self.handler));
        match proof::compute(&self.provider, &self.state.request, &self.state.choice, pin).await {
            Ok(message) => {
                tokio::spawn(self.respond(message));
            }
            Err(err) => self.finish(err.into()),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(session = %self.id, action = %self.action))]
    async fn respond(self, message: ProofMessage) {
        let result = response::submit(
            &self.provider,
            &self.server_url,
            self.version,
            &self.state.request,
            message,
        )
        .await;
        match result {
            Ok(()) => self.finish(Outcome::Success),
            Err(err) => self.finish(err.into()),
        }
    }
}
