//! In-memory provider and recording handler for end-to-end session tests.
//!
//! The provider plays the part of the session server, the user's credential
//! store and the keyshare server. The handler records every call it receives
//! and answers permission and PIN requests the way a test tells it to.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use credibil_session::handler::{Handler, PermissionHandler, PinHandler, Status};
use credibil_session::identifier::SchemeManagerIdentifier;
use credibil_session::provider::{
    CredentialManager, IssueSignatureMessage, Keyshare, KeyshareOutcome, PinRelay, ProofMessage,
    Transport,
};
use credibil_session::request::{
    Action, AttributeDisjunction, AttributeIdentifier, DisclosureChoice, DisclosureRequest,
    IssuanceRequest, SessionRequest, SignatureRequest,
};
use credibil_session::{Error, Qr, Version};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use url::Url;

pub const SERVER_URL: &str = "https://server.example.com/irma/session/7b3f";
pub const SERVER_NAME: &str = "Example Server";
pub const AGE_OVER_18: &str = "irma-demo.MijnOverheid.ageLower.over18";
pub const EMAIL: &str = "pbdf.pbdf.email.email";
pub const BLOCK_DURATION: u64 = 60;

//--------------------------------------------------------------------------
// Session server fixtures
//--------------------------------------------------------------------------

/// Encode a token payload as an (unsigned) compact JWS.
pub fn token(payload: &Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

fn content(attribute: &str) -> Value {
    json!([{ "label": "Requested attribute", "attributes": [attribute] }])
}

pub fn disclosure_token(attribute: &str) -> String {
    token(&json!({
        "iss": SERVER_NAME,
        "sub": "verification_request",
        "iat": 1_700_000_000,
        "sprequest": { "validity": 120, "request": { "content": content(attribute) } }
    }))
}

pub fn signature_token(attribute: &str) -> String {
    token(&json!({
        "iss": SERVER_NAME,
        "sub": "signature_request",
        "iat": 1_700_000_000,
        "absrequest": { "validity": 120, "request": {
            "content": content(attribute),
            "message": "I owe Alice ten euros",
            "messageType": "STRING"
        }}
    }))
}

pub fn issuance_token(disclose: Option<&str>) -> String {
    let disclose = disclose.map_or_else(|| json!([]), content);
    token(&json!({
        "iss": SERVER_NAME,
        "sub": "issue_request",
        "iat": 1_700_000_000,
        "iprequest": { "validity": 120, "request": {
            "credentials": [{
                "validity": 1_893_456_000,
                "credential": "irma-demo.MijnOverheid.root",
                "attributes": { "BSN": "299792458" }
            }, {
                "credential": "pbdf.pbdf.email",
                "attributes": { "email": "alice@example.com", "domain": "example.com" }
            }],
            "disclose": disclose
        }}
    }))
}

/// Session information wrapping `jwt`, with a nonce too large for any
/// machine integer.
pub fn session_info(jwt: &str) -> String {
    format!(
        r#"{{
            "jwt": "{jwt}",
            "nonce": 340282366920938463463374607431768211457,
            "context": 1337,
            "keys": {{ "irma-demo.MijnOverheid": 2 }}
        }}"#
    )
}

pub fn qr(session_type: &str) -> Qr {
    Qr {
        url: SERVER_URL.into(),
        session_type: session_type.into(),
        protocol_version: "2.0".into(),
        protocol_max_version: "2.5".into(),
    }
}

pub fn choice(attribute: &str) -> DisclosureChoice {
    DisclosureChoice {
        attributes: vec![AttributeIdentifier {
            attribute_type: attribute.into(),
            credential_hash: "d4b1f2".into(),
        }],
    }
}

//--------------------------------------------------------------------------
// Provider
//--------------------------------------------------------------------------

/// How the keyshare server behaves.
#[derive(Clone, Debug)]
pub enum KeyshareScript {
    /// Ask for the PIN up to `attempts` times, then block.
    Pin { expected: String, attempts: u32 },

    /// Block straight away.
    Blocked(u64),

    /// Fail straight away.
    Error(String),
}

/// Everything the provider was asked to do.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Get { url: String, version: Version },
    Post { url: String, version: Version, body: Value },
    Proofs { signature: bool },
    Commitments,
    ProofBuilders,
    IssuanceProofBuilders,
    Keyshare { builders: Vec<String> },
    Construct { signatures: usize, key_counters: Vec<Option<u32>> },
}

/// Test set-up for the provider.
#[derive(Clone, Debug)]
pub struct Server {
    pub session_info: String,
    pub proofs_reply: String,
    pub commitments_reply: String,
    pub held: Vec<String>,
    pub keyshare_schemes: Vec<String>,
    pub keyshare: KeyshareScript,
    pub transport_fails: bool,
    pub crypto_fails: bool,
    pub construct_fails: bool,
}

impl Server {
    pub fn new(session_info: String) -> Self {
        Self {
            session_info,
            proofs_reply: r#""VALID""#.into(),
            commitments_reply: r#"[{"signature": "sig-1"}, {"signature": "sig-2"}]"#.into(),
            held: vec![AGE_OVER_18.into(), EMAIL.into()],
            keyshare_schemes: vec![],
            keyshare: KeyshareScript::Pin {
                expected: "12345".into(),
                attempts: 3,
            },
            transport_fails: false,
            crypto_fails: false,
            construct_fails: false,
        }
    }
}

#[derive(Clone)]
pub struct Provider {
    server: Arc<Server>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Provider {
    pub fn new(server: Server) -> Self {
        Self {
            server: Arc::new(server),
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("should lock").clone()
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Post { url, body, .. } => Some((url, body)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("should lock").push(call);
    }
}

impl credibil_session::provider::Provider for Provider {}

impl Transport for Provider {
    async fn get<T>(&self, url: &Url, version: Version) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Send,
    {
        self.record(Call::Get {
            url: url.to_string(),
            version,
        });
        if self.server.transport_fails {
            bail!("connection refused");
        }
        if !url.path().ends_with("/jwt") {
            bail!("404 not found: {url}");
        }
        Ok(serde_json::from_str(&self.server.session_info)?)
    }

    async fn post<T, B>(&self, url: &Url, version: Version, body: &B) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync,
    {
        let body = serde_json::to_value(body)?;
        self.record(Call::Post {
            url: url.to_string(),
            version,
            body,
        });
        if self.server.transport_fails {
            bail!("connection refused");
        }
        let reply = match url.path().rsplit('/').next() {
            Some("proofs") => &self.server.proofs_reply,
            Some("commitments") => &self.server.commitments_reply,
            _ => bail!("404 not found: {url}"),
        };
        Ok(serde_json::from_str(reply)?)
    }
}

impl CredentialManager for Provider {
    type ProofBuilder = String;

    fn keyshare_enabled(&self, scheme_manager: &SchemeManagerIdentifier) -> bool {
        self.server.keyshare_schemes.iter().any(|s| s == scheme_manager.as_str())
    }

    fn check_satisfiability(
        &self, disjunctions: &[AttributeDisjunction],
    ) -> Vec<AttributeDisjunction> {
        let held: HashSet<&str> = self.server.held.iter().map(String::as_str).collect();
        disjunctions
            .iter()
            .filter(|d| !d.attributes.iter().any(|a| held.contains(a.as_str())))
            .cloned()
            .collect()
    }

    fn proofs(
        &self, choice: &DisclosureChoice, request: &SessionRequest, signature: bool,
    ) -> anyhow::Result<ProofMessage> {
        self.record(Call::Proofs { signature });
        if self.server.crypto_fails {
            bail!("proof of knowledge failed");
        }
        Ok(ProofMessage::new(json!({
            "proofs": choice.attributes,
            "signature": signature,
            "context": request.context(),
            "nonce": request.nonce(),
        })))
    }

    fn issue_commitments(
        &self, request: &IssuanceRequest, choice: &DisclosureChoice,
    ) -> anyhow::Result<ProofMessage> {
        self.record(Call::Commitments);
        if self.server.crypto_fails {
            bail!("commitment failed");
        }
        Ok(ProofMessage::new(json!({
            "commitments": request.credentials.len(),
            "proofs": choice.attributes,
            "nonce": request.nonce,
        })))
    }

    fn proof_builders(&self, choice: &DisclosureChoice) -> anyhow::Result<Vec<String>> {
        self.record(Call::ProofBuilders);
        if self.server.crypto_fails {
            bail!("builder failed");
        }
        Ok(choice.attributes.iter().map(|a| a.attribute_type.to_string()).collect())
    }

    fn issuance_proof_builders(
        &self, request: &IssuanceRequest, _choice: &DisclosureChoice,
    ) -> anyhow::Result<Vec<String>> {
        self.record(Call::IssuanceProofBuilders);
        if self.server.crypto_fails {
            bail!("builder failed");
        }
        Ok(request.credentials.iter().map(|c| c.credential.to_string()).collect())
    }

    async fn construct_credentials(
        &self, signatures: Vec<IssueSignatureMessage>, request: &IssuanceRequest,
    ) -> anyhow::Result<()> {
        self.record(Call::Construct {
            signatures: signatures.len(),
            key_counters: request.credentials.iter().map(|c| c.key_counter).collect(),
        });
        if self.server.construct_fails {
            bail!("issuer signature does not verify");
        }
        Ok(())
    }
}

impl Keyshare for Provider {
    async fn keyshare(
        &self, request: &SessionRequest, builders: Vec<String>, pin: PinRelay,
    ) -> KeyshareOutcome {
        self.record(Call::Keyshare {
            builders: builders.clone(),
        });
        match &self.server.keyshare {
            KeyshareScript::Pin { expected, attempts } => {
                for remaining in (1..=*attempts).rev() {
                    let Some(entered) = pin.ask_pin(remaining).await else {
                        return KeyshareOutcome::Error(anyhow!("pin entry aborted"));
                    };
                    if entered == *expected {
                        return KeyshareOutcome::Done(ProofMessage::new(json!({
                            "keyshare": builders,
                            "action": request.action().to_string(),
                            "nonce": request.nonce(),
                        })));
                    }
                }
                KeyshareOutcome::Blocked(BLOCK_DURATION)
            }
            KeyshareScript::Blocked(duration) => KeyshareOutcome::Blocked(*duration),
            KeyshareScript::Error(msg) => KeyshareOutcome::Error(anyhow!(msg.clone())),
        }
    }
}

//--------------------------------------------------------------------------
// Handler
//--------------------------------------------------------------------------

/// How the user answers the permission request.
#[derive(Clone, Debug)]
pub enum Decision {
    /// Grant, disclosing the given choice.
    Grant(DisclosureChoice),

    /// Decline.
    Decline,

    /// Walk away without answering.
    Ignore,
}

#[derive(Debug)]
pub enum Event {
    Status(Action, Status),
    Permission { kind: &'static str, server_name: String, request: SessionRequest },
    Pin(u32),
    Success(Action),
    Cancelled(Action),
    Failure(Action, Error),
    Unsatisfiable(Action, Vec<AttributeDisjunction>),
}

impl Event {
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success(_) | Self::Cancelled(_) | Self::Failure(..) | Self::Unsatisfiable(..)
        )
    }

    pub fn label(&self) -> String {
        match self {
            Self::Status(action, status) => format!("status {action} {status}"),
            Self::Permission { kind, .. } => format!("ask {kind} permission"),
            Self::Pin(remaining) => format!("ask pin with {remaining} attempts"),
            Self::Success(action) => format!("success {action}"),
            Self::Cancelled(action) => format!("cancelled {action}"),
            Self::Failure(action, _) => format!("failure {action}"),
            Self::Unsatisfiable(action, _) => format!("unsatisfiable {action}"),
        }
    }
}

pub struct Recorder {
    decision: Decision,
    pins: Mutex<VecDeque<String>>,
    events: Mutex<Vec<Event>>,
    terminal: mpsc::UnboundedSender<()>,
}

/// Resolves once the session has ended.
pub struct Ended(mpsc::UnboundedReceiver<()>);

impl Ended {
    /// Wait for the terminal call, then linger so that any stray call after
    /// it would be recorded too.
    pub async fn wait(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.0.recv())
            .await
            .expect("session should end")
            .expect("recorder should be alive");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

impl Recorder {
    pub fn new(decision: Decision) -> (Arc<Self>, Ended) {
        Self::with_pins(decision, &[])
    }

    pub fn with_pins(decision: Decision, pins: &[&str]) -> (Arc<Self>, Ended) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorder = Self {
            decision,
            pins: Mutex::new(pins.iter().map(ToString::to_string).collect()),
            events: Mutex::new(vec![]),
            terminal: tx,
        };
        (Arc::new(recorder), Ended(rx))
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().expect("should lock").iter().map(Event::label).collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events.lock().expect("should lock").iter().filter(|e| e.is_terminal()).count()
    }

    /// Take the single terminal event.
    pub fn terminal(&self) -> Event {
        assert_eq!(self.terminal_count(), 1, "expected exactly one terminal call");
        let mut events = self.events.lock().expect("should lock");
        let index = events.iter().position(Event::is_terminal).expect("should have terminal");
        events.remove(index)
    }

    /// The error of the single terminal failure.
    pub fn failure(&self) -> (Action, Error) {
        match self.terminal() {
            Event::Failure(action, err) => (action, err),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    /// The request of the single permission request.
    pub fn permission_request(&self) -> SessionRequest {
        let events = self.events.lock().expect("should lock");
        let mut requests = events.iter().filter_map(|e| match e {
            Event::Permission { request, .. } => Some(request.clone()),
            _ => None,
        });
        let request = requests.next().expect("should have asked permission");
        assert!(requests.next().is_none(), "permission asked more than once");
        request
    }

    /// Server names shown with each permission request.
    pub fn server_names(&self) -> Vec<String> {
        let events = self.events.lock().expect("should lock");
        events
            .iter()
            .filter_map(|e| match e {
                Event::Permission { server_name, .. } => Some(server_name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn asked_permission(&self) -> bool {
        self.events.lock().expect("should lock").iter().any(|e| matches!(e, Event::Permission { .. }))
    }

    fn push(&self, event: Event) {
        let terminal = event.is_terminal();
        self.events.lock().expect("should lock").push(event);
        if terminal {
            let _ = self.terminal.send(());
        }
    }

    fn ask(
        &self, kind: &'static str, request: SessionRequest, server_name: String,
        callback: PermissionHandler,
    ) {
        self.push(Event::Permission {
            kind,
            server_name,
            request,
        });

        // answer from elsewhere, as a user interface would
        let decision = self.decision.clone();
        tokio::spawn(async move {
            match decision {
                Decision::Grant(choice) => callback.respond(true, Some(choice)),
                Decision::Decline => callback.respond(false, None),
                Decision::Ignore => drop(callback),
            }
        });
    }
}

impl Handler for Recorder {
    fn status_update(&self, action: Action, status: Status) {
        self.push(Event::Status(action, status));
    }

    fn success(&self, action: Action) {
        self.push(Event::Success(action));
    }

    fn cancelled(&self, action: Action) {
        self.push(Event::Cancelled(action));
    }

    fn failure(&self, action: Action, err: Error) {
        self.push(Event::Failure(action, err));
    }

    fn unsatisfiable_request(&self, action: Action, missing: Vec<AttributeDisjunction>) {
        self.push(Event::Unsatisfiable(action, missing));
    }

    fn ask_issuance_permission(
        &self, request: IssuanceRequest, server_name: String, callback: PermissionHandler,
    ) {
        self.ask("issuance", SessionRequest::Issuing(request), server_name, callback);
    }

    fn ask_verification_permission(
        &self, request: DisclosureRequest, server_name: String, callback: PermissionHandler,
    ) {
        self.ask("verification", SessionRequest::Disclosing(request), server_name, callback);
    }

    fn ask_signature_permission(
        &self, request: SignatureRequest, server_name: String, callback: PermissionHandler,
    ) {
        self.ask("signature", SessionRequest::Signing(request), server_name, callback);
    }

    fn ask_pin(&self, remaining_attempts: u32, callback: PinHandler) {
        self.push(Event::Pin(remaining_attempts));
        let pin = self.pins.lock().expect("should lock").pop_front();
        match pin {
            Some(pin) => callback.submit(pin),
            None => callback.abort(),
        }
    }
}
