//! # Session Requests
//!
//! The three kinds of request a server can make of the holder, and the
//! holder's choice of attributes in answer to one.
//!
//! Every request lists its attribute requirements as disjunctions: each
//! [`AttributeDisjunction`] is met by disclosing any one of its attributes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::identifier::{
    AttributeTypeIdentifier, CredentialTypeIdentifier, IssuerIdentifier, SchemeManagerIdentifier,
};

/// The kind of session the server has started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Disclose attributes to a verifier.
    Disclosing,

    /// Sign a message with attributes (an attribute-based signature).
    Signing,

    /// Receive new credentials from an issuer.
    Issuing,

    /// Anything else. Never a valid session.
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disclosing => "disclosing",
            Self::Signing => "signing",
            Self::Issuing => "issuing",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "disclosing" => Self::Disclosing,
            "signing" => Self::Signing,
            "issuing" => Self::Issuing,
            _ => Self::Unknown,
        })
    }
}

/// A requirement satisfied by any one of its attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttributeDisjunction {
    /// Human-readable description of the requirement.
    pub label: String,

    /// Attributes, any one of which meets the requirement.
    pub attributes: Vec<AttributeTypeIdentifier>,

    /// Values the disclosed attribute must have, if constrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<AttributeTypeIdentifier, String>>,
}

/// Request to disclose attributes to a verifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DisclosureRequest {
    /// Attributes requested.
    pub content: Vec<AttributeDisjunction>,

    /// Session context, supplied by the server alongside the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Number>,

    /// Session nonce, supplied by the server alongside the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Number>,
}

/// Request to sign a message using attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    /// Attributes requested.
    pub content: Vec<AttributeDisjunction>,

    /// Message to sign.
    pub message: String,

    /// Type of the message, e.g. `STRING`.
    pub message_type: String,

    /// Session context, supplied by the server alongside the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Number>,

    /// Session nonce, supplied by the server alongside the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Number>,
}

/// A single credential on offer from an issuer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    /// When the credential expires.
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub validity: Option<DateTime<Utc>>,

    /// Which issuer public key will sign the credential. Resolved from the
    /// server's key information when the session starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_counter: Option<u32>,

    /// The credential type.
    pub credential: CredentialTypeIdentifier,

    /// Attribute values, keyed by attribute name.
    pub attributes: BTreeMap<String, String>,
}

/// Request to receive credentials from an issuer, optionally disclosing
/// attributes at the same time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IssuanceRequest {
    /// Credentials on offer.
    pub credentials: Vec<CredentialRequest>,

    /// Attributes that must be disclosed to receive the credentials.
    #[serde(default)]
    pub disclose: Vec<AttributeDisjunction>,

    /// Session context, supplied by the server alongside the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Number>,

    /// Session nonce, supplied by the server alongside the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Number>,
}

/// A decoded session request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionRequest {
    /// Disclosure to a verifier.
    Disclosing(DisclosureRequest),

    /// Attribute-based signature.
    Signing(SignatureRequest),

    /// Credential issuance.
    Issuing(IssuanceRequest),
}

impl SessionRequest {
    /// The action the request belongs to.
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Disclosing(_) => Action::Disclosing,
            Self::Signing(_) => Action::Signing,
            Self::Issuing(_) => Action::Issuing,
        }
    }

    /// The attribute requirements of the request.
    #[must_use]
    pub fn disjunctions(&self) -> &[AttributeDisjunction] {
        match self {
            Self::Disclosing(request) => &request.content,
            Self::Signing(request) => &request.content,
            Self::Issuing(request) => &request.disclose,
        }
    }

    /// Session context.
    #[must_use]
    pub const fn context(&self) -> Option<&Number> {
        match self {
            Self::Disclosing(request) => request.context.as_ref(),
            Self::Signing(request) => request.context.as_ref(),
            Self::Issuing(request) => request.context.as_ref(),
        }
    }

    /// Session nonce.
    #[must_use]
    pub const fn nonce(&self) -> Option<&Number> {
        match self {
            Self::Disclosing(request) => request.nonce.as_ref(),
            Self::Signing(request) => request.nonce.as_ref(),
            Self::Issuing(request) => request.nonce.as_ref(),
        }
    }

    /// Bind the context and nonce the server sent alongside the request and,
    /// for issuance, the key counter of each credential's issuer. An issuer
    /// missing from `keys` is given counter `0`.
    pub fn bind(&mut self, context: Number, nonce: Number, keys: &HashMap<IssuerIdentifier, u32>) {
        match self {
            Self::Disclosing(request) => {
                request.context = Some(context);
                request.nonce = Some(nonce);
            }
            Self::Signing(request) => {
                request.context = Some(context);
                request.nonce = Some(nonce);
            }
            Self::Issuing(request) => {
                request.context = Some(context);
                request.nonce = Some(nonce);
                for credential in &mut request.credentials {
                    let issuer = credential.credential.issuer();
                    credential.key_counter = Some(keys.get(&issuer).copied().unwrap_or_default());
                }
            }
        }
    }

    /// Every scheme manager involved in the request: those of the requested
    /// attributes and, for issuance, of the credentials on offer.
    #[must_use]
    pub fn scheme_managers(&self) -> BTreeSet<SchemeManagerIdentifier> {
        let mut managers: BTreeSet<SchemeManagerIdentifier> = self
            .disjunctions()
            .iter()
            .flat_map(|disjunction| &disjunction.attributes)
            .map(AttributeTypeIdentifier::scheme_manager)
            .collect();
        if let Self::Issuing(request) = self {
            managers.extend(request.credentials.iter().map(|c| c.credential.scheme_manager()));
        }
        managers
    }

    /// Whether the request needs the distributed (keyshare) computation path,
    /// given a test for keyshare-enabled scheme managers.
    pub fn distributed(&self, keyshare_enabled: impl Fn(&SchemeManagerIdentifier) -> bool) -> bool {
        self.scheme_managers().iter().any(keyshare_enabled)
    }
}

/// An attribute in a specific credential held by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeIdentifier {
    /// The attribute type.
    #[serde(rename = "type")]
    pub attribute_type: AttributeTypeIdentifier,

    /// Hash identifying the credential instance holding the attribute.
    pub credential_hash: String,
}

/// The attributes the user chose to disclose, one per disjunction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DisclosureChoice {
    /// Chosen attributes.
    pub attributes: Vec<AttributeIdentifier>,
}
