//! Document identifiers and their URL form.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// URL scheme prefix for document URLs.
const URL_SCHEME: &str = "automerge:";

/// A 16-byte document identifier.
///
/// Equality is byte equality. The external form is
/// `automerge:<base58check(bytes)>`; legacy bare-UUID strings are still
/// accepted by [`DocumentId::from_url`] and converted with a deprecation
/// warning.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId([u8; 16]);

impl DocumentId {
    /// Mint a fresh random document id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw bytes of this id.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Render the canonical document URL, e.g. `automerge:4NMNnkMhL8jXrdJ9jamS58PAVdXu`.
    pub fn to_url(&self) -> String {
        format!("{}{}", URL_SCHEME, self)
    }

    /// Parse a document URL.
    ///
    /// Accepts the canonical `automerge:<base58check>` form and, for
    /// backwards compatibility, a bare UUID string. Anything else is an
    /// [`TypesError::InvalidUrl`].
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(encoded) = url.strip_prefix(URL_SCHEME) {
            let bytes = bs58::decode(encoded)
                .with_check(None)
                .into_vec()
                .map_err(|_| TypesError::InvalidUrl(url.to_string()))?;
            let bytes: [u8; 16] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| TypesError::InvalidLength(bytes.len()))?;
            return Ok(Self(bytes));
        }

        if let Ok(uuid) = Uuid::parse_str(url) {
            warn!(
                "Legacy UUID document id {url} is deprecated; use {}",
                Self(uuid.into_bytes()).to_url()
            );
            return Ok(Self(uuid.into_bytes()));
        }

        Err(TypesError::InvalidUrl(url.to_string()))
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).with_check().into_string())
    }
}

impl std::fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentId({self})")
    }
}
