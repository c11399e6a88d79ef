//! SQLite-backed [`SummaryStore`]. Entries are stored as tagged JSON rows.

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::{Revision, Scalar, SummaryDocument, SummaryEntry, SummaryStore, changed_error, closed_error};
use crate::db::DbHandle;
use crate::errors::{BrewError, Result};
use crate::store::sqlite::{format_date, parse_date};

#[derive(Debug, Clone)]
pub struct SqliteSummaryStore {
    db: DbHandle,
}

impl SqliteSummaryStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

/// Fails unless an open document exists for `id`.
fn ensure_open(conn: &Connection, id: &str) -> Result<()> {
    let rendered: Option<Option<String>> = conn
        .query_row(
            "SELECT rendered FROM summaries WHERE recipe_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match rendered {
        None => Err(BrewError::not_found("summary", id)),
        Some(Some(_)) => Err(closed_error(id)),
        Some(None) => Ok(()),
    }
}

#[async_trait]
impl SummaryStore for SqliteSummaryStore {
    async fn create(&self, id: &str, title: &str) -> Result<()> {
        let doc = SummaryDocument::new(id, title);
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM summaries WHERE recipe_id = ?1", params![doc.recipe_id])?;
                conn.execute(
                    "DELETE FROM summary_entries WHERE recipe_id = ?1",
                    params![doc.recipe_id],
                )?;
                conn.execute(
                    "INSERT INTO summaries (recipe_id, title, created_at) VALUES (?1, ?2, ?3)",
                    params![doc.recipe_id, doc.title, format_date(&doc.created_at)],
                )?;
                Ok(())
            })
            .await
    }

    async fn get(&self, id: &str) -> Result<SummaryDocument> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT title, created_at, evaporation, efficiency, rendered
                         FROM summaries WHERE recipe_id = ?1",
                        params![id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, f64>(2)?,
                                row.get::<_, f64>(3)?,
                                row.get::<_, Option<String>>(4)?,
                            ))
                        },
                    )
                    .optional()?
                    .ok_or_else(|| BrewError::not_found("summary", &id))?;
                let (title, created_at, evaporation, efficiency, rendered) = row;

                let mut stmt = conn.prepare(
                    "SELECT entry FROM summary_entries WHERE recipe_id = ?1 ORDER BY id",
                )?;
                let raw = stmt
                    .query_map(params![id], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                let entries = raw
                    .iter()
                    .map(|e| serde_json::from_str::<SummaryEntry>(e))
                    .collect::<serde_json::Result<Vec<_>>>()?;

                Ok(SummaryDocument {
                    recipe_id: id,
                    title,
                    created_at: parse_date(&created_at)?,
                    entries,
                    evaporation: evaporation as f32,
                    efficiency: efficiency as f32,
                    rendered,
                })
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM summary_entries WHERE recipe_id = ?1", params![id])?;
                conn.execute("DELETE FROM summaries WHERE recipe_id = ?1", params![id])?;
                Ok(())
            })
            .await
    }

    async fn append(&self, id: &str, entry: SummaryEntry) -> Result<()> {
        let id = id.to_string();
        let entry = serde_json::to_string(&entry)?;
        self.db
            .call(move |conn| {
                ensure_open(conn, &id)?;
                conn.execute(
                    "INSERT INTO summary_entries (recipe_id, entry) VALUES (?1, ?2)",
                    params![id, entry],
                )?;
                Ok(())
            })
            .await
    }

    async fn set_scalar(&self, id: &str, scalar: Scalar, value: f32) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_open(conn, &id)?;
                conn.execute(
                    &format!(
                        "UPDATE summaries SET {} = ?1 WHERE recipe_id = ?2",
                        scalar.column()
                    ),
                    params![value as f64, id],
                )?;
                Ok(())
            })
            .await
    }

    async fn close(&self, id: &str, rendered: String, revision: Revision) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_open(conn, &id)?;
                let stored = conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM summary_entries WHERE recipe_id = ?1),
                            evaporation, efficiency
                     FROM summaries WHERE recipe_id = ?1",
                    params![id],
                    |row| {
                        Ok(Revision {
                            entries: row.get::<_, i64>(0)? as usize,
                            evaporation: row.get::<_, f64>(1)? as f32,
                            efficiency: row.get::<_, f64>(2)? as f32,
                        })
                    },
                )?;
                if stored != revision {
                    return Err(changed_error(&id));
                }
                conn.execute(
                    "UPDATE summaries SET rendered = ?1 WHERE recipe_id = ?2",
                    params![rendered, id],
                )?;
                Ok(())
            })
            .await
    }
}
