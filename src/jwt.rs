//! # Request Decoder
//!
//! The server's session request arrives as a compact JWS. The token's schema
//! is chosen by the session action before anything is decoded, so a token
//! meant for one kind of session can never be read as another.
//!
//! The token signature is checked by the caller's infrastructure, not here.

use anyhow::{anyhow, Context};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::request::{Action, DisclosureRequest, IssuanceRequest, SessionRequest, SignatureRequest};

/// `sub` claim of a disclosure request token.
pub const VERIFICATION_REQUEST: &str = "verification_request";

/// `sub` claim of a signature request token.
pub const SIGNATURE_REQUEST: &str = "signature_request";

/// `sub` claim of an issuance request token.
pub const ISSUE_REQUEST: &str = "issue_request";

#[derive(Deserialize)]
struct Wrapped<T> {
    request: T,
}

#[derive(Deserialize)]
struct ServiceProviderClaims {
    iss: String,
    sub: String,
    sprequest: Wrapped<DisclosureRequest>,
}

#[derive(Deserialize)]
struct SignatureRequestorClaims {
    iss: String,
    sub: String,
    absrequest: Wrapped<SignatureRequest>,
}

#[derive(Deserialize)]
struct IdentityProviderClaims {
    iss: String,
    sub: String,
    iprequest: Wrapped<IssuanceRequest>,
}

/// A session request decoded from its token, with the display name of the
/// server that issued it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// Display name of the requesting server (the token issuer).
    pub server_name: String,

    /// The request.
    pub request: SessionRequest,
}

/// Decode a session request token according to the session action.
///
/// # Errors
///
/// Returns [`Error::UnknownAction`] for [`Action::Unknown`], and
/// [`Error::InvalidToken`] if the token is malformed or does not match the
/// schema for `action`.
pub fn decode(action: Action, token: &str) -> Result<Decoded> {
    let decoded = match action {
        Action::Disclosing => {
            let claims: ServiceProviderClaims = claims(token).map_err(Error::InvalidToken)?;
            check_subject(&claims.sub, VERIFICATION_REQUEST)?;
            Decoded {
                server_name: claims.iss,
                request: SessionRequest::Disclosing(claims.sprequest.request),
            }
        }
        Action::Signing => {
            let claims: SignatureRequestorClaims = claims(token).map_err(Error::InvalidToken)?;
            check_subject(&claims.sub, SIGNATURE_REQUEST)?;
            Decoded {
                server_name: claims.iss,
                request: SessionRequest::Signing(claims.absrequest.request),
            }
        }
        Action::Issuing => {
            let claims: IdentityProviderClaims = claims(token).map_err(Error::InvalidToken)?;
            check_subject(&claims.sub, ISSUE_REQUEST)?;
            Decoded {
                server_name: claims.iss,
                request: SessionRequest::Issuing(claims.iprequest.request),
            }
        }
        Action::Unknown => return Err(Error::UnknownAction(action.to_string())),
    };
    Ok(decoded)
}

fn claims<T: DeserializeOwned>(token: &str) -> anyhow::Result<T> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(anyhow!("token is not a compact JWS"));
    };
    let payload = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('='))
        .map_err(|e| anyhow!("payload is not base64url: {e}"))?;
    serde_json::from_slice(&payload).context("payload does not match the request schema")
}

fn check_subject(sub: &str, expected: &str) -> Result<()> {
    if sub != expected {
        return Err(Error::InvalidToken(anyhow!("expected subject {expected:?}, found {sub:?}")));
    }
    Ok(())
}
