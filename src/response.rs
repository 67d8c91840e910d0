//! # Response Dispatcher
//!
//! Sends the computed message to the server and interprets the reply.
//!
//! Disclosure and signature proofs go to the `proofs` endpoint, which answers
//! with a bare verdict string. Issuance commitments go to the `commitments`
//! endpoint, which answers with the issuer's signatures over the new
//! credentials.

use url::Url;

use crate::error::{Error, Result};
use crate::provider::{CredentialManager, IssueSignatureMessage, ProofMessage, Transport};
use crate::request::SessionRequest;
use crate::version::Version;

/// Endpoint receiving disclosure and signature proofs.
pub const PROOFS: &str = "proofs";

/// Endpoint receiving issuance commitments.
pub const COMMITMENTS: &str = "commitments";

/// The only verdict accepting submitted proofs.
pub const VALID: &str = "VALID";

/// Submit the message to the server at `server_url`.
///
/// # Errors
///
/// Returns [`Error::Transport`] if the exchange fails, [`Error::Rejected`] if
/// the server does not accept the proofs, and [`Error::Crypto`] if the issued
/// credentials cannot be constructed.
pub async fn submit<P: Transport + CredentialManager>(
    provider: &P, server_url: &Url, version: Version, request: &SessionRequest,
    message: ProofMessage,
) -> Result<()> {
    match request {
        SessionRequest::Disclosing(_) | SessionRequest::Signing(_) => {
            let url = server_url.join(PROOFS)?;
            let verdict: String =
                provider.post(&url, version, &message).await.map_err(Error::Transport)?;
            if verdict != VALID {
                return Err(Error::Rejected(verdict));
            }
        }
        SessionRequest::Issuing(issuance) => {
            let url = server_url.join(COMMITMENTS)?;
            let signatures: Vec<IssueSignatureMessage> =
                provider.post(&url, version, &message).await.map_err(Error::Transport)?;
            tracing::debug!(count = signatures.len(), "received issuer signatures");
            provider.construct_credentials(signatures, issuance).await.map_err(Error::Crypto)?;
        }
    }
    Ok(())
}
