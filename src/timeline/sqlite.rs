//! SQLite-backed [`TimelineStore`]. Timestamps are stored as nanoseconds
//! since the Unix epoch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{INITIAL_EVENT, TimelineEvent, TimelineStore, render_sorted, validate_event};
use crate::db::DbHandle;
use crate::errors::{BrewError, Result, require_recipe_id};

#[derive(Debug, Clone)]
pub struct SqliteTimelineStore {
    db: DbHandle,
}

impl SqliteTimelineStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

fn to_nanos(timestamp: DateTime<Utc>) -> Result<i64> {
    timestamp.timestamp_nanos_opt().ok_or_else(|| {
        BrewError::Validation(format!("timestamp {} cannot be stored", timestamp))
    })
}

fn insert_event(conn: &rusqlite::Connection, id: &str, event: &TimelineEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO timelines (recipe_id, timestamp_ns, event) VALUES (?1, ?2, ?3)",
        params![id, to_nanos(event.timestamp)?, event.message],
    )?;
    Ok(())
}

#[async_trait]
impl TimelineStore for SqliteTimelineStore {
    async fn add_timeline(&self, id: &str) -> Result<()> {
        require_recipe_id(id)?;
        let id = id.to_string();
        let event = TimelineEvent::now(INITIAL_EVENT);
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM timelines WHERE recipe_id = ?1", params![id])?;
                insert_event(conn, &id, &event)
            })
            .await
    }

    async fn delete_timeline(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM timelines WHERE recipe_id = ?1", params![id])?;
                Ok(())
            })
            .await
    }

    async fn add_event(&self, id: &str, message: &str) -> Result<()> {
        validate_event(id, message)?;
        let id = id.to_string();
        let event = TimelineEvent::now(message);
        self.db
            .call(move |conn| insert_event(conn, &id, &event))
            .await
    }

    async fn get_timeline(&self, id: &str) -> Result<Vec<String>> {
        require_recipe_id(id)?;
        let id = id.to_string();
        let events = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT timestamp_ns, event FROM timelines WHERE recipe_id = ?1",
                )?;
                let rows = stmt.query_map(params![id], |row| {
                    Ok(TimelineEvent {
                        timestamp: DateTime::from_timestamp_nanos(row.get(0)?),
                        message: row.get(1)?,
                    })
                })?;
                let events = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                if events.is_empty() {
                    return Err(BrewError::not_found("timeline", &id));
                }
                Ok(events)
            })
            .await?;
        Ok(render_sorted(events))
    }
}
