//! In-memory [`RecipeStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

use super::{RecipeStore, name_matches};
use crate::errors::{BrewError, Result};
use crate::recipe::{
    PrimingSugarResult, Recipe, RecipeResults, RecipeStatus, ResultType, SgMeasurement,
};

/// Everything the store keeps about one recipe besides its dates and flags.
#[derive(Debug)]
struct RecipeRecord {
    recipe: Arc<Recipe>,
    results: RecipeResults,
    sg_measurements: Vec<SgMeasurement>,
    sugar_results: Vec<PrimingSugarResult>,
}

/// Store that keeps recipes in process memory.
///
/// Recipes are handed out as shared `Arc`s, so status updates are visible to
/// every holder immediately through the recipe's [`crate::recipe::RecipeState`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    recipes: RwLock<HashMap<String, RecipeRecord>>,
    dates: Mutex<HashMap<String, Vec<(String, DateTime<Utc>)>>>,
    flags: Mutex<HashMap<String, HashMap<String, bool>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_record<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut RecipeRecord) -> R,
    ) -> Result<R> {
        let mut recipes = self.recipes.write().await;
        let record = recipes
            .get_mut(id)
            .ok_or_else(|| BrewError::not_found("recipe", id))?;
        Ok(f(record))
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn store(&self, mut recipe: Recipe) -> Result<String> {
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        recipe.id = id.clone();
        recipe.set_status(RecipeStatus::Created, Vec::<String>::new());
        let record = RecipeRecord {
            recipe: Arc::new(recipe),
            results: RecipeResults::default(),
            sg_measurements: Vec::new(),
            sugar_results: Vec::new(),
        };
        self.recipes.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn retrieve(&self, id: &str) -> Result<Arc<Recipe>> {
        self.recipes
            .read()
            .await
            .get(id)
            .map(|r| r.recipe.clone())
            .ok_or_else(|| BrewError::not_found("recipe", id))
    }

    async fn list(&self) -> Result<Vec<Arc<Recipe>>> {
        let recipes = self.recipes.read().await;
        let mut list: Vec<Arc<Recipe>> = recipes.values().map(|r| r.recipe.clone()).collect();
        list.sort_by_key(|r| r.id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(list)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.recipes
            .write()
            .await
            .remove(id)
            .ok_or_else(|| BrewError::not_found("recipe", id))?;
        self.dates.lock().await.remove(id);
        self.flags.lock().await.remove(id);
        Ok(())
    }

    async fn update_status(&self, id: &str, status: RecipeStatus, params: &[String]) -> Result<()> {
        let recipe = self.retrieve(id).await?;
        recipe.set_status(status, params.iter().cloned());
        Ok(())
    }

    async fn update_result(&self, id: &str, result: ResultType, value: f32) -> Result<()> {
        self.with_record(id, |r| r.results.set(result, value)).await
    }

    async fn retrieve_results(&self, id: &str) -> Result<RecipeResults> {
        self.with_record(id, |r| r.results).await
    }

    async fn add_main_ferm_sg(&self, id: &str, measurement: SgMeasurement) -> Result<()> {
        self.with_record(id, |r| r.sg_measurements.push(measurement))
            .await
    }

    async fn retrieve_main_ferm_sgs(&self, id: &str) -> Result<Vec<SgMeasurement>> {
        self.with_record(id, |r| r.sg_measurements.clone()).await
    }

    async fn add_date(&self, id: &str, date: DateTime<Utc>, name: &str) -> Result<()> {
        self.dates
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .push((name.to_string(), date));
        Ok(())
    }

    async fn retrieve_named_dates(
        &self,
        id: &str,
        name_pattern: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>> {
        let dates = self.dates.lock().await;
        Ok(dates
            .get(id)
            .map(|list| {
                list.iter()
                    .filter(|(name, _)| name_matches(name_pattern, name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_bool_flag(&self, id: &str, name: &str, value: bool) -> Result<()> {
        self.flags
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    async fn retrieve_bool_flag(&self, id: &str, name: &str) -> Result<bool> {
        let flags = self.flags.lock().await;
        Ok(flags
            .get(id)
            .and_then(|f| f.get(name))
            .copied()
            .unwrap_or(false))
    }

    async fn add_sugar_result(&self, id: &str, result: PrimingSugarResult) -> Result<()> {
        self.with_record(id, |r| r.sugar_results.push(result)).await
    }

    async fn retrieve_sugar_results(&self, id: &str) -> Result<Vec<PrimingSugarResult>> {
        self.with_record(id, |r| r.sugar_results.clone()).await
    }
}
