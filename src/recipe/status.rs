//! Recipe process status and its concurrently readable holder.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Stage of the brewing process a recipe is currently in.
///
/// Persisted as its ordinal. Any status may follow any other; the operator is
/// free to jump between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    #[default]
    Unknown,
    Created,
    Mashing,
    Lautering,
    Boiling,
    Cooling,
    PreFermentation,
    Fermenting,
    Bottled,
    Fridge,
    Finished,
}

impl RecipeStatus {
    /// Returns all statuses in process order.
    pub fn all() -> &'static [RecipeStatus] {
        &[
            RecipeStatus::Unknown,
            RecipeStatus::Created,
            RecipeStatus::Mashing,
            RecipeStatus::Lautering,
            RecipeStatus::Boiling,
            RecipeStatus::Cooling,
            RecipeStatus::PreFermentation,
            RecipeStatus::Fermenting,
            RecipeStatus::Bottled,
            RecipeStatus::Fridge,
            RecipeStatus::Finished,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeStatus::Unknown => "unknown",
            RecipeStatus::Created => "created",
            RecipeStatus::Mashing => "mashing",
            RecipeStatus::Lautering => "lautering",
            RecipeStatus::Boiling => "boiling",
            RecipeStatus::Cooling => "cooling",
            RecipeStatus::PreFermentation => "pre_fermentation",
            RecipeStatus::Fermenting => "fermenting",
            RecipeStatus::Bottled => "bottled",
            RecipeStatus::Fridge => "fridge",
            RecipeStatus::Finished => "finished",
        }
    }

    /// Ordinal used by the SQL schema.
    pub fn ordinal(&self) -> i64 {
        Self::all()
            .iter()
            .position(|s| s == self)
            .map(|p| p as i64)
            .unwrap_or(0)
    }

    /// Inverse of [`RecipeStatus::ordinal`]; unknown ordinals map to `Unknown`.
    pub fn from_ordinal(ordinal: i64) -> Self {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::all().get(i).copied())
            .unwrap_or(RecipeStatus::Unknown)
    }
}

impl std::fmt::Display for RecipeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecipeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace(['-', ' '], "_");
        Self::all()
            .iter()
            .find(|status| status.as_str() == normalized || status.as_str().replace('_', "") == normalized)
            .copied()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid recipe status '{}'. Valid values: {}",
                    s,
                    Self::all()
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Current status of a recipe together with its stage parameters.
///
/// The pair is replaced atomically: a reader never sees a new status with
/// stale parameters or the reverse.
#[derive(Debug, Default)]
pub struct RecipeState {
    inner: Mutex<(RecipeStatus, Vec<String>)>,
}

impl RecipeState {
    pub fn new(status: RecipeStatus, params: Vec<String>) -> Self {
        Self {
            inner: Mutex::new((status, params)),
        }
    }

    pub fn get_status(&self) -> (RecipeStatus, Vec<String>) {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (guard.0, guard.1.clone())
    }

    pub fn set_status<I, S>(&self, status: RecipeStatus, params: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let params: Vec<String> = params.into_iter().map(Into::into).collect();
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = (status, params);
    }
}

impl Clone for RecipeState {
    fn clone(&self) -> Self {
        let (status, params) = self.get_status();
        Self::new(status, params)
    }
}
