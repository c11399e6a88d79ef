//! Typed error taxonomy for the brew day orchestrator.
//!
//! Every core operation returns [`BrewError`]. The four variants map onto the
//! failure classes the request layer distinguishes:
//! - `NotFound`: nothing registered for the given key
//! - `InvalidState`: persisted or in-memory state does not allow the operation
//! - `Validation`: the caller supplied an unusable argument
//! - `Upstream`: a persistence or notification collaborator failed

use thiserror::Error;

/// Errors from the orchestration core and its store implementations.
#[derive(Debug, Error)]
pub enum BrewError {
    #[error("No {what} found for recipe {id}")]
    NotFound { what: String, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream failure: {0:#}")]
    Upstream(#[source] anyhow::Error),
}

impl BrewError {
    pub fn not_found(what: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the request layer should answer with its generic failure page
    /// rather than an internal error.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Validation(_))
    }
}

impl From<anyhow::Error> for BrewError {
    fn from(err: anyhow::Error) -> Self {
        Self::Upstream(err)
    }
}

impl From<rusqlite::Error> for BrewError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Upstream(err.into())
    }
}

impl From<serde_json::Error> for BrewError {
    fn from(err: serde_json::Error) -> Self {
        Self::Upstream(err.into())
    }
}

/// Rejects an empty recipe identifier at the boundary.
pub fn require_recipe_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(BrewError::Validation("no recipe id provided".to_string()));
    }
    Ok(())
}

pub type Result<T, E = BrewError> = std::result::Result<T, E>;
