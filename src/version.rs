//! # Protocol Version Negotiation
//!
//! The server announces the range of protocol versions it is willing to speak
//! and the client picks the highest version from its own table that falls
//! inside that range.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A `major.minor` protocol version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major version number.
    pub major: u32,

    /// Minor version number.
    pub minor: u32,
}

impl Version {
    /// Create a version from its parts.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let Some((major, minor)) = s.trim().split_once('.') else {
            anyhow::bail!("version {s:?} is not of the form major.minor");
        };
        Ok(Self {
            major: major.parse()?,
            minor: minor.parse()?,
        })
    }
}

/// The inclusive range of versions requested by the server.
///
/// A range with `min` above `max` is accepted; it simply never matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRange {
    /// Lowest acceptable version.
    pub min: Version,

    /// Highest acceptable version.
    pub max: Version,
}

impl VersionRange {
    /// Parse a range from the literal version texts supplied by the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] if either bound is not a
    /// `major.minor` version.
    pub fn parse(min: &str, max: &str) -> Result<Self> {
        let unsupported = || Error::UnsupportedVersion {
            min: min.to_string(),
            max: max.to_string(),
        };
        Ok(Self {
            min: min.parse().map_err(|_| unsupported())?,
            max: max.parse().map_err(|_| unsupported())?,
        })
    }

    fn admits(&self, major: u32, minor: u32) -> bool {
        let above_minimum =
            major > self.min.major || (major == self.min.major && minor >= self.min.minor);
        let under_maximum =
            major < self.max.major || (major == self.max.major && minor <= self.max.minor);
        above_minimum && under_maximum
    }
}

/// The protocol versions this client supports, keyed by major version.
///
/// Minor versions are kept in descending order whichever way they were
/// supplied.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "BTreeMap<u32, Vec<u32>>", into = "BTreeMap<u32, Vec<u32>>")]
pub struct SupportedVersions(BTreeMap<u32, Vec<u32>>);

impl SupportedVersions {
    /// Create a table from a map of major version to minor versions.
    #[must_use]
    pub fn new(mut versions: BTreeMap<u32, Vec<u32>>) -> Self {
        for minors in versions.values_mut() {
            minors.sort_unstable_by(|a, b| b.cmp(a));
            minors.dedup();
        }
        Self(versions)
    }

    /// Select the highest supported version inside the requested range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] if no supported version lies in
    /// the range.
    pub fn negotiate(&self, range: &VersionRange) -> Result<Version> {
        for (major, minors) in self.0.iter().rev() {
            for minor in minors {
                if range.admits(*major, *minor) {
                    return Ok(Version::new(*major, *minor));
                }
            }
        }
        Err(Error::UnsupportedVersion {
            min: range.min.to_string(),
            max: range.max.to_string(),
        })
    }

    /// Every supported version, highest first.
    pub fn iter(&self) -> impl Iterator<Item = Version> + '_ {
        self.0
            .iter()
            .rev()
            .flat_map(|(major, minors)| minors.iter().map(|minor| Version::new(*major, *minor)))
    }
}

impl Default for SupportedVersions {
    fn default() -> Self {
        Self::new(BTreeMap::from([(2, vec![2, 1])]))
    }
}

impl From<BTreeMap<u32, Vec<u32>>> for SupportedVersions {
    fn from(versions: BTreeMap<u32, Vec<u32>>) -> Self {
        Self::new(versions)
    }
}

impl From<SupportedVersions> for BTreeMap<u32, Vec<u32>> {
    fn from(versions: SupportedVersions) -> Self {
        versions.0
    }
}
