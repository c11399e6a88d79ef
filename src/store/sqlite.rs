//! SQLite-backed [`RecipeStore`].

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;

use super::{RecipeStore, like_pattern};
use crate::db::DbHandle;
use crate::errors::{BrewError, Result};
use crate::recipe::{
    PrimingSugarResult, Recipe, RecipeResults, RecipeState, RecipeStatus, ResultType,
    SgMeasurement,
};

/// Durable recipe store sharing the process-wide [`DbHandle`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: DbHandle,
}

impl SqliteStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

pub(crate) fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| BrewError::Upstream(anyhow::anyhow!("Corrupt date '{}' in store: {}", raw, e)))
}

/// Recipe ids are integer row ids; anything else cannot exist.
fn row_id(id: &str) -> Result<i64> {
    id.parse::<i64>()
        .map_err(|_| BrewError::not_found("recipe", id))
}

fn ensure_recipe(conn: &Connection, id: &str) -> Result<i64> {
    let row = row_id(id)?;
    let exists: Option<i64> = conn
        .query_row("SELECT id FROM recipes WHERE id = ?1", params![row], |r| r.get(0))
        .optional()?;
    exists.ok_or_else(|| BrewError::not_found("recipe", id))
}

fn read_recipe(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn build_recipe((id, status, args, body): (i64, i64, String, String)) -> Result<Recipe> {
    let mut recipe: Recipe = serde_json::from_str(&body)?;
    let args: Vec<String> = serde_json::from_str(&args)?;
    recipe.id = id.to_string();
    recipe.state = RecipeState::new(RecipeStatus::from_ordinal(status), args);
    Ok(recipe)
}

#[async_trait]
impl RecipeStore for SqliteStore {
    async fn store(&self, mut recipe: Recipe) -> Result<String> {
        recipe.id = String::new();
        let body = serde_json::to_string(&recipe)?;
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO recipes (name, status, status_args, body) VALUES (?1, ?2, '[]', ?3)",
                    params![recipe.name, RecipeStatus::Created.ordinal(), body],
                )?;
                Ok(conn.last_insert_rowid().to_string())
            })
            .await
    }

    async fn retrieve(&self, id: &str) -> Result<Arc<Recipe>> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, status, status_args, body FROM recipes WHERE id = ?1",
                        params![row_id(&id)?],
                        read_recipe,
                    )
                    .optional()?
                    .ok_or_else(|| BrewError::not_found("recipe", &id))?;
                Ok(Arc::new(build_recipe(row)?))
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Arc<Recipe>>> {
        self.db
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT id, status, status_args, body FROM recipes ORDER BY id")?;
                let rows = stmt.query_map([], read_recipe)?;
                let mut recipes = Vec::new();
                for row in rows {
                    recipes.push(Arc::new(build_recipe(row?)?));
                }
                Ok(recipes)
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let row = ensure_recipe(conn, &id)?;
                conn.execute("DELETE FROM recipes WHERE id = ?1", params![row])?;
                for table in ["recipe_results", "dates", "bool_flags", "sg_measurements", "sugar_results"] {
                    conn.execute(
                        &format!("DELETE FROM {} WHERE recipe_id = ?1", table),
                        params![id],
                    )?;
                }
                Ok(())
            })
            .await
    }

    async fn update_status(&self, id: &str, status: RecipeStatus, params: &[String]) -> Result<()> {
        let id = id.to_string();
        let args = serde_json::to_string(params)?;
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE recipes SET status = ?1, status_args = ?2 WHERE id = ?3",
                    params![status.ordinal(), args, row_id(&id)?],
                )?;
                if changed == 0 {
                    return Err(BrewError::not_found("recipe", &id));
                }
                Ok(())
            })
            .await
    }

    async fn update_result(&self, id: &str, result: ResultType, value: f32) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_recipe(conn, &id)?;
                conn.execute(
                    "INSERT INTO recipe_results (recipe_id) VALUES (?1) ON CONFLICT(recipe_id) DO NOTHING",
                    params![id],
                )?;
                conn.execute(
                    &format!(
                        "UPDATE recipe_results SET {} = ?1 WHERE recipe_id = ?2",
                        result.column()
                    ),
                    params![value as f64, id],
                )?;
                Ok(())
            })
            .await
    }

    async fn retrieve_results(&self, id: &str) -> Result<RecipeResults> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_recipe(conn, &id)?;
                let results = conn
                    .query_row(
                        "SELECT hot_wort_vol, original_sg, final_sg, alcohol, main_ferm_vol, vol_bb
                         FROM recipe_results WHERE recipe_id = ?1",
                        params![id],
                        |row| {
                            Ok(RecipeResults {
                                hot_wort_volume: row.get::<_, f64>(0)? as f32,
                                original_gravity: row.get::<_, f64>(1)? as f32,
                                final_gravity: row.get::<_, f64>(2)? as f32,
                                alcohol: row.get::<_, f64>(3)? as f32,
                                main_fermentation_volume: row.get::<_, f64>(4)? as f32,
                                volume_before_boil: row.get::<_, f64>(5)? as f32,
                            })
                        },
                    )
                    .optional()?;
                Ok(results.unwrap_or_default())
            })
            .await
    }

    async fn add_main_ferm_sg(&self, id: &str, measurement: SgMeasurement) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_recipe(conn, &id)?;
                conn.execute(
                    "INSERT INTO sg_measurements (recipe_id, value, date, is_final, notes)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        measurement.value as f64,
                        format_date(&measurement.date),
                        measurement.is_final,
                        measurement.notes
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn retrieve_main_ferm_sgs(&self, id: &str) -> Result<Vec<SgMeasurement>> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_recipe(conn, &id)?;
                let mut stmt = conn.prepare(
                    "SELECT value, date, is_final, notes FROM sg_measurements
                     WHERE recipe_id = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![id], |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?;
                let mut measurements = Vec::new();
                for row in rows {
                    let (value, date, is_final, notes) = row?;
                    measurements.push(SgMeasurement {
                        value: value as f32,
                        date: parse_date(&date)?,
                        is_final,
                        notes,
                    });
                }
                Ok(measurements)
            })
            .await
    }

    async fn add_date(&self, id: &str, date: DateTime<Utc>, name: &str) -> Result<()> {
        let id = id.to_string();
        let name = name.to_string();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO dates (recipe_id, name, date) VALUES (?1, ?2, ?3)",
                    params![id, name, format_date(&date)],
                )?;
                Ok(())
            })
            .await
    }

    async fn retrieve_named_dates(
        &self,
        id: &str,
        name_pattern: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>> {
        let id = id.to_string();
        let pattern = like_pattern(name_pattern);
        self.db
            .call(move |conn| {
                // LIKE ignores ASCII case, rows are re-checked with name_matches below.
                let mut stmt = conn.prepare(
                    "SELECT name, date FROM dates
                     WHERE recipe_id = ?1 AND name LIKE ?2 ESCAPE '!'
                     ORDER BY id",
                )?;
                let rows = stmt.query_map(params![id, pattern], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                let mut dates = Vec::new();
                for row in rows {
                    let (name, date) = row?;
                    dates.push((name, parse_date(&date)?));
                }
                Ok(dates)
            })
            .await
            .map(|dates| {
                dates
                    .into_iter()
                    .filter(|(name, _)| super::name_matches(name_pattern, name))
                    .collect()
            })
    }

    async fn add_bool_flag(&self, id: &str, name: &str, value: bool) -> Result<()> {
        let id = id.to_string();
        let name = name.to_string();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO bool_flags (recipe_id, name, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(recipe_id, name) DO UPDATE SET value = excluded.value",
                    params![id, name, value],
                )?;
                Ok(())
            })
            .await
    }

    async fn retrieve_bool_flag(&self, id: &str, name: &str) -> Result<bool> {
        let id = id.to_string();
        let name = name.to_string();
        self.db
            .call(move |conn| {
                let value: Option<bool> = conn
                    .query_row(
                        "SELECT value FROM bool_flags WHERE recipe_id = ?1 AND name = ?2",
                        params![id, name],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value.unwrap_or(false))
            })
            .await
    }

    async fn add_sugar_result(&self, id: &str, result: PrimingSugarResult) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_recipe(conn, &id)?;
                conn.execute(
                    "INSERT INTO sugar_results (recipe_id, water, amount, alcohol) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        id,
                        result.water as f64,
                        result.amount as f64,
                        result.alcohol as f64
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn retrieve_sugar_results(&self, id: &str) -> Result<Vec<PrimingSugarResult>> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                ensure_recipe(conn, &id)?;
                let mut stmt = conn.prepare(
                    "SELECT water, amount, alcohol FROM sugar_results WHERE recipe_id = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![id], |row| {
                    Ok(PrimingSugarResult {
                        water: row.get::<_, f64>(0)? as f32,
                        amount: row.get::<_, f64>(1)? as f32,
                        alcohol: row.get::<_, f64>(2)? as f32,
                    })
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }
}
