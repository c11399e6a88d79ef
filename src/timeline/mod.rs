//! Append-only, time-ordered event log per recipe.
//!
//! Events are appended in arrival order and sorted by timestamp on every
//! read. Events sharing an identical timestamp have no defined relative
//! order.

pub mod sqlite;

pub use sqlite::SqliteTimelineStore;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::errors::{BrewError, Result, require_recipe_id};

pub const INITIAL_EVENT: &str = "Initialized Recipe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl TimelineEvent {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// `2024-05-01T10:00:00.123456789Z Mash started`
    pub fn render(&self) -> String {
        format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.message
        )
    }
}

/// Sorts events by timestamp and renders them.
pub fn render_sorted(mut events: Vec<TimelineEvent>) -> Vec<String> {
    events.sort_by_key(|e| e.timestamp);
    events.iter().map(TimelineEvent::render).collect()
}

fn validate_event(id: &str, message: &str) -> Result<()> {
    require_recipe_id(id)?;
    if message.trim().is_empty() {
        return Err(BrewError::Validation(
            "invalid empty event for timeline".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Starts a fresh timeline for a recipe, discarding any previous one.
    async fn add_timeline(&self, id: &str) -> Result<()>;
    async fn delete_timeline(&self, id: &str) -> Result<()>;
    /// Appends `(now, message)`, creating the timeline if needed.
    async fn add_event(&self, id: &str, message: &str) -> Result<()>;
    /// Rendered events in ascending timestamp order.
    async fn get_timeline(&self, id: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryTimelineStore {
    timelines: Mutex<HashMap<String, Vec<TimelineEvent>>>,
}

impl MemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimelineStore for MemoryTimelineStore {
    async fn add_timeline(&self, id: &str) -> Result<()> {
        require_recipe_id(id)?;
        self.timelines
            .lock()
            .await
            .insert(id.to_string(), vec![TimelineEvent::now(INITIAL_EVENT)]);
        Ok(())
    }

    async fn delete_timeline(&self, id: &str) -> Result<()> {
        self.timelines.lock().await.remove(id);
        Ok(())
    }

    async fn add_event(&self, id: &str, message: &str) -> Result<()> {
        validate_event(id, message)?;
        let event = TimelineEvent::now(message);
        self.timelines
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn get_timeline(&self, id: &str) -> Result<Vec<String>> {
        require_recipe_id(id)?;
        let events = self
            .timelines
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BrewError::not_found("timeline", id))?;
        Ok(render_sorted(events))
    }
}
