//! # Configuration
//!
//! Settings injected when a session is started. They are read, never changed,
//! by the session.

use serde::{Deserialize, Serialize};

use crate::version::SupportedVersions;

/// Session engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Protocol versions this client speaks.
    #[serde(default)]
    pub supported_versions: SupportedVersions,
}

impl Config {
    /// Parse configuration from a JSON document. Omitted settings take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid configuration JSON.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
