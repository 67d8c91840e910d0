//! # Provider
//!
//! The session engine does not talk to the network, hold credentials or do
//! any of the proof mathematics itself. Implementors supply those through the
//! provider traits in this module:
//!
//! - [`Transport`] performs the HTTP round-trips with the server.
//! - [`CredentialManager`] checks satisfiability against the user's
//!   credentials and computes proofs, commitments and new credentials.
//! - [`Keyshare`] runs the distributed protocol with the keyshare server for
//!   credentials whose scheme requires it.
//!
//! A type implementing all three implements [`Provider`] and is handed to
//! [`session::start`](crate::session::start).

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::handler::{Handler, PinHandler};
use crate::identifier::SchemeManagerIdentifier;
use crate::request::{AttributeDisjunction, DisclosureChoice, IssuanceRequest, SessionRequest};
use crate::version::Version;

/// HTTP header carrying the negotiated protocol version on every request.
pub const VERSION_HEADER: &str = "X-IRMA-ProtocolVersion";

/// Provider is the collection of collaborators a session needs.
pub trait Provider: Transport + CredentialManager + Keyshare + Clone + 'static {}

/// `Transport` exchanges JSON messages with the session server.
///
/// Implementations send the negotiated `version` in the [`VERSION_HEADER`]
/// header. Errors are passed to the application unchanged, and any retry
/// policy belongs to the implementation.
pub trait Transport: Send + Sync {
    /// GET `url` and deserialize the JSON response body.
    fn get<T>(&self, url: &Url, version: Version) -> impl Future<Output = anyhow::Result<T>> + Send
    where
        T: DeserializeOwned + Send;

    /// POST `body` as JSON to `url` and deserialize the JSON response body.
    fn post<T, B>(
        &self, url: &Url, version: Version, body: &B,
    ) -> impl Future<Output = anyhow::Result<T>> + Send
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync;
}

/// A proof or commitment message ready to be sent to the server. Its content
/// is opaque to the session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProofMessage(Value);

impl ProofMessage {
    /// Wrap a computed message.
    #[must_use]
    pub const fn new(message: Value) -> Self {
        Self(message)
    }

    /// The message content.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

/// An issuer's signature over a credential, returned in answer to issuance
/// commitments. Its content is opaque to the session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct IssueSignatureMessage(Value);

impl IssueSignatureMessage {
    /// Wrap a signature message.
    #[must_use]
    pub const fn new(message: Value) -> Self {
        Self(message)
    }

    /// The message content.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

/// `CredentialManager` gives the session access to the user's credentials and
/// the proof system.
pub trait CredentialManager: Send + Sync {
    /// An unfinished proof, completed during the keyshare protocol.
    type ProofBuilder: Send + 'static;

    /// Whether credentials of the scheme manager are bound to a keyshare
    /// server.
    fn keyshare_enabled(&self, scheme_manager: &SchemeManagerIdentifier) -> bool;

    /// The requirements the user's credentials cannot meet. Empty when the
    /// request can be satisfied.
    fn check_satisfiability(
        &self, disjunctions: &[AttributeDisjunction],
    ) -> Vec<AttributeDisjunction>;

    /// Prove possession of the chosen attributes. With `signature` set, the
    /// proof is an attribute-based signature over the request's message.
    ///
    /// # Errors
    ///
    /// Returns an error if the proof cannot be computed.
    fn proofs(
        &self, choice: &DisclosureChoice, request: &SessionRequest, signature: bool,
    ) -> anyhow::Result<ProofMessage>;

    /// Compute the commitments for an issuance request, including proofs of
    /// the chosen attributes when the request asks for a disclosure.
    ///
    /// # Errors
    ///
    /// Returns an error if the commitments cannot be computed.
    fn issue_commitments(
        &self, request: &IssuanceRequest, choice: &DisclosureChoice,
    ) -> anyhow::Result<ProofMessage>;

    /// Unfinished proofs of the chosen attributes, for the keyshare protocol.
    ///
    /// # Errors
    ///
    /// Returns an error if a builder cannot be created.
    fn proof_builders(&self, choice: &DisclosureChoice) -> anyhow::Result<Vec<Self::ProofBuilder>>;

    /// Unfinished issuance commitments, for the keyshare protocol.
    ///
    /// # Errors
    ///
    /// Returns an error if a builder cannot be created.
    fn issuance_proof_builders(
        &self, request: &IssuanceRequest, choice: &DisclosureChoice,
    ) -> anyhow::Result<Vec<Self::ProofBuilder>>;

    /// Build and store the credentials the issuer has signed.
    ///
    /// # Errors
    ///
    /// Returns an error if a signature is invalid or a credential cannot be
    /// stored.
    fn construct_credentials(
        &self, signatures: Vec<IssueSignatureMessage>, request: &IssuanceRequest,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// How the keyshare protocol ended. Exactly one is produced per run.
#[derive(Debug)]
pub enum KeyshareOutcome {
    /// The proofs are complete and can be sent to the server.
    Done(ProofMessage),

    /// The keyshare server has blocked the user for the given number of
    /// seconds.
    Blocked(u64),

    /// The protocol failed.
    Error(anyhow::Error),
}

/// `Keyshare` completes proofs together with the keyshare server.
pub trait Keyshare: CredentialManager {
    /// Run the keyshare protocol over the unfinished proofs, asking for the
    /// user's PIN through `pin` as often as the server requires.
    fn keyshare(
        &self, request: &SessionRequest, builders: Vec<Self::ProofBuilder>, pin: PinRelay,
    ) -> impl Future<Output = KeyshareOutcome> + Send;
}

/// Passes the keyshare protocol's PIN prompts on to the [`Handler`].
#[derive(Clone)]
pub struct PinRelay {
    handler: Arc<dyn Handler>,
}

impl PinRelay {
    pub(crate) fn new(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }

    /// Ask the user for their PIN. Returns `None` if the user aborts.
    pub async fn ask_pin(&self, remaining_attempts: u32) -> Option<String> {
        let (callback, rx) = PinHandler::channel();
        tracing::debug!(remaining_attempts, "asking for keyshare pin");
        self.handler.ask_pin(remaining_attempts, callback);
        rx.await.ok()
    }
}

impl std::fmt::Debug for PinRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinRelay").finish_non_exhaustive()
    }
}
