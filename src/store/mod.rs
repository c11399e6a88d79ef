//! Recipe persistence contract and its implementations.
//!
//! The orchestration core only talks to [`RecipeStore`]. Two interchangeable
//! backends are provided:
//! - [`MemoryStore`]: process-local, used for tests and ephemeral sessions
//! - [`SqliteStore`]: durable, backed by the shared [`crate::db::DbHandle`]
//!
//! Dates and boolean flags are the primitives timers and reminders are built
//! from. They are keyed by recipe id and a free-form name; they do not require
//! the recipe itself to exist in the store.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::errors::Result;
use crate::recipe::{
    PrimingSugarResult, Recipe, RecipeResults, RecipeStatus, ResultType, SgMeasurement,
};

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Stores a recipe with status `created` and returns its identifier.
    async fn store(&self, recipe: Recipe) -> Result<String>;
    async fn retrieve(&self, id: &str) -> Result<Arc<Recipe>>;
    async fn list(&self) -> Result<Vec<Arc<Recipe>>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn update_status(&self, id: &str, status: RecipeStatus, params: &[String]) -> Result<()>;

    async fn update_result(&self, id: &str, result: ResultType, value: f32) -> Result<()>;
    async fn retrieve_result(&self, id: &str, result: ResultType) -> Result<f32> {
        Ok(self.retrieve_results(id).await?.get(result))
    }
    async fn retrieve_results(&self, id: &str) -> Result<RecipeResults>;

    async fn add_main_ferm_sg(&self, id: &str, measurement: SgMeasurement) -> Result<()>;
    async fn retrieve_main_ferm_sgs(&self, id: &str) -> Result<Vec<SgMeasurement>>;

    /// Stores an instant under a purpose name (timer boundaries, reminder dates).
    async fn add_date(&self, id: &str, date: DateTime<Utc>, name: &str) -> Result<()>;
    /// Returns the instants whose name matches `name_pattern` in insertion order.
    /// See [`name_matches`] for the pattern syntax.
    async fn retrieve_dates(&self, id: &str, name_pattern: &str) -> Result<Vec<DateTime<Utc>>> {
        Ok(self
            .retrieve_named_dates(id, name_pattern)
            .await?
            .into_iter()
            .map(|(_, date)| date)
            .collect())
    }
    /// Like [`RecipeStore::retrieve_dates`] but also returns the matched names.
    async fn retrieve_named_dates(
        &self,
        id: &str,
        name_pattern: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>>;

    async fn add_bool_flag(&self, id: &str, name: &str, value: bool) -> Result<()>;
    /// Unset flags read as `false`.
    async fn retrieve_bool_flag(&self, id: &str, name: &str) -> Result<bool>;

    async fn add_sugar_result(&self, id: &str, result: PrimingSugarResult) -> Result<()>;
    async fn retrieve_sugar_results(&self, id: &str) -> Result<Vec<PrimingSugarResult>>;
}

/// Check if a date/flag name matches a pattern.
/// Supports simple glob patterns, matched case-sensitively:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
///
/// A pattern without wildcards only matches the identical name.
pub fn name_matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    glob_match(&pattern, &name)
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'*', rest)) => {
            // Skip consecutive stars
            let rest = match rest.iter().position(|c| *c != '*') {
                Some(pos) => &rest[pos..],
                None => return true,
            };
            (0..=text.len()).any(|i| glob_match(rest, &text[i..]))
        }
        Some((&'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}

/// Translate a [`name_matches`] pattern into a SQL `LIKE` pattern using `!`
/// as the escape character.
pub fn like_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '!' => {
                out.push('!');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
