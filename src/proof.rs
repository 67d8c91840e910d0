//! # Proof Orchestrator
//!
//! Computes the message answering a permitted request. Requests involving a
//! keyshare-enabled scheme manager take the distributed path, where the
//! proofs are finished together with the keyshare server; all others are
//! computed locally by the credential manager.

use crate::error::{Error, Result};
use crate::provider::{CredentialManager, Keyshare, KeyshareOutcome, PinRelay, ProofMessage};
use crate::request::{DisclosureChoice, SessionRequest};

/// Compute the proof or commitment message for the request.
///
/// # Errors
///
/// Returns [`Error::Crypto`] when a proof, commitment or builder cannot be
/// computed, and [`Error::KeyshareBlocked`] or [`Error::Keyshare`] when the
/// keyshare protocol does not complete.
pub async fn compute<P: Keyshare>(
    provider: &P, request: &SessionRequest, choice: &DisclosureChoice, pin: PinRelay,
) -> Result<ProofMessage> {
    if request.distributed(|manager| provider.keyshare_enabled(manager)) {
        tracing::debug!("computing proofs with keyshare server");
        distributed(provider, request, choice, pin).await
    } else {
        tracing::debug!("computing proofs locally");
        local(provider, request, choice)
    }
}

fn local<P: CredentialManager>(
    provider: &P, request: &SessionRequest, choice: &DisclosureChoice,
) -> Result<ProofMessage> {
    let message = match request {
        SessionRequest::Disclosing(_) => provider.proofs(choice, request, false),
        SessionRequest::Signing(_) => provider.proofs(choice, request, true),
        SessionRequest::Issuing(issuance) => provider.issue_commitments(issuance, choice),
    };
    message.map_err(Error::Crypto)
}

async fn distributed<P: Keyshare>(
    provider: &P, request: &SessionRequest, choice: &DisclosureChoice, pin: PinRelay,
) -> Result<ProofMessage> {
    let builders = match request {
        SessionRequest::Disclosing(_) | SessionRequest::Signing(_) => provider.proof_builders(choice),
        SessionRequest::Issuing(issuance) => provider.issuance_proof_builders(issuance, choice),
    }
    .map_err(Error::Crypto)?;

    match provider.keyshare(request, builders, pin).await {
        KeyshareOutcome::Done(message) => Ok(message),
        KeyshareOutcome::Blocked(duration) => Err(Error::KeyshareBlocked { duration }),
        KeyshareOutcome::Error(err) => Err(Error::Keyshare(err)),
    }
}
