//! # Identifiers
//!
//! Scheme managers, issuers, credential types and attribute types are named
//! by dotted paths, each level extending its parent:
//!
//! ```text
//! scheme                          scheme manager
//! scheme.issuer                   issuer
//! scheme.issuer.credential        credential type
//! scheme.issuer.credential.attr   attribute type
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from its dotted path.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier's dotted path.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The last segment of the path.
            #[must_use]
            pub fn name(&self) -> &str {
                self.0.rsplit_once('.').map_or(self.0.as_str(), |(_, name)| name)
            }

            /// The path of the enclosing identifier, empty at the root.
            #[must_use]
            pub fn parent_path(&self) -> &str {
                self.0.rsplit_once('.').map_or("", |(parent, _)| parent)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

identifier!(
    /// Identifies a scheme manager: the root of trust for a family of issuers.
    SchemeManagerIdentifier
);

identifier!(
    /// Identifies an issuer within a scheme manager.
    IssuerIdentifier
);

identifier!(
    /// Identifies a credential type offered by an issuer.
    CredentialTypeIdentifier
);

identifier!(
    /// Identifies an attribute within a credential type.
    AttributeTypeIdentifier
);

impl IssuerIdentifier {
    /// The scheme manager the issuer belongs to.
    #[must_use]
    pub fn scheme_manager(&self) -> SchemeManagerIdentifier {
        SchemeManagerIdentifier::new(self.parent_path())
    }
}

impl CredentialTypeIdentifier {
    /// The issuer of the credential type.
    #[must_use]
    pub fn issuer(&self) -> IssuerIdentifier {
        IssuerIdentifier::new(self.parent_path())
    }

    /// The scheme manager the credential type belongs to.
    #[must_use]
    pub fn scheme_manager(&self) -> SchemeManagerIdentifier {
        self.issuer().scheme_manager()
    }
}

impl AttributeTypeIdentifier {
    /// The credential type the attribute belongs to.
    #[must_use]
    pub fn credential_type(&self) -> CredentialTypeIdentifier {
        CredentialTypeIdentifier::new(self.parent_path())
    }

    /// The scheme manager the attribute belongs to.
    #[must_use]
    pub fn scheme_manager(&self) -> SchemeManagerIdentifier {
        self.credential_type().scheme_manager()
    }
}
