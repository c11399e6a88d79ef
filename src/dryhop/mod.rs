//! Per-recipe dry-hop additions and their reminder watchers.
//!
//! Entries and watchers live in two separately locked maps: an entry can be
//! listed and edited long before a reminder is scheduled for it.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{BrewError, Result};
use crate::recipe::Recipe;
use crate::watcher::Watcher;

static SANITIZE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s|[()]").unwrap());

/// Turns a display name into a token usable as an external reference:
/// whitespace and parentheses become `_`, one trailing `_` is dropped.
///
/// `Citra(1)` becomes `Citra_1`, `East Kent Goldings(2)` becomes
/// `East_Kent_Goldings_2`.
pub fn sanitize_name(name: &str) -> String {
    let replaced = SANITIZE_REGEX.replace_all(name, "_");
    replaced
        .strip_suffix('_')
        .unwrap_or(replaced.as_ref())
        .to_string()
}

/// One scheduled addition during fermentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryHopEntry {
    /// Sanitized token, unique within a recipe.
    pub id: String,
    /// Display name with its ordinal, e.g. `Citra(2)`.
    pub name: String,
    /// Amount in grams
    pub amount: f32,
    pub is_hop: bool,
    pub notification_set: bool,
}

impl DryHopEntry {
    pub fn new(name: impl Into<String>, amount: f32, is_hop: bool) -> Self {
        let name = name.into();
        Self {
            id: sanitize_name(&name),
            name,
            amount,
            is_hop,
            notification_set: false,
        }
    }
}

/// Derives the additions of a recipe: dry hops first, then the fermentation
/// ingredients. Repeated ingredients are numbered in recipe order.
pub fn dry_hop_entries(recipe: &Recipe) -> Vec<DryHopEntry> {
    let mut seen: HashMap<&str, u32> = HashMap::new();
    let mut entries = Vec::new();
    let hops = recipe
        .hopping
        .hops
        .iter()
        .filter(|h| h.dry_hop)
        .map(|h| (h.name.as_str(), h.amount, true));
    let additions = recipe
        .fermentation
        .additional_ingredients
        .iter()
        .map(|a| (a.name.as_str(), a.amount, false));
    for (name, amount, is_hop) in hops.chain(additions) {
        let ordinal = seen.entry(name).or_insert(0);
        *ordinal += 1;
        entries.push(DryHopEntry::new(
            format!("{}({})", name, ordinal),
            amount,
            is_hop,
        ));
    }
    entries
}

/// Registry of dry-hop entries and reminder watchers keyed by recipe id.
#[derive(Debug, Default)]
pub struct DryHopRegistry {
    entries: Mutex<HashMap<String, BTreeMap<String, DryHopEntry>>>,
    notifications: Mutex<HashMap<String, HashMap<String, Watcher>>>,
}

impl DryHopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry, creating the recipe's collection on
    /// first use.
    pub async fn add_entry(&self, id: &str, entry: DryHopEntry) {
        self.entries
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .insert(entry.id.clone(), entry);
    }

    /// Entries of a recipe ordered by entry id.
    pub async fn get_entries(&self, id: &str) -> Result<Vec<DryHopEntry>> {
        self.entries
            .lock()
            .await
            .get(id)
            .map(|entries| entries.values().cloned().collect())
            .ok_or_else(|| BrewError::not_found("dry hops", id))
    }

    pub async fn get_entry(&self, id: &str, entry_id: &str) -> Result<DryHopEntry> {
        self.entries
            .lock()
            .await
            .get(id)
            .and_then(|entries| entries.get(entry_id))
            .cloned()
            .ok_or_else(|| BrewError::not_found(format!("dry hop {}", entry_id), id))
    }

    /// Binds a reminder to an existing entry and marks it as notified.
    ///
    /// A watcher already bound to the entry is cancelled and replaced.
    pub async fn add_notification(&self, id: &str, entry_id: &str, watcher: Watcher) -> Result<()> {
        {
            let mut entries = self.entries.lock().await;
            let entry = entries
                .get_mut(id)
                .and_then(|entries| entries.get_mut(entry_id))
                .ok_or_else(|| BrewError::not_found(format!("dry hop {}", entry_id), id))?;
            entry.notification_set = true;
        }
        let replaced = self
            .notifications
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .insert(entry_id.to_string(), watcher);
        if let Some(old) = replaced {
            debug!(recipe_id = id, entry_id, "Replacing dry hop reminder");
            old.cancel();
        }
        Ok(())
    }

    /// Watchers of a recipe keyed by entry id.
    pub async fn get_notifications(&self, id: &str) -> Result<HashMap<String, Watcher>> {
        self.notifications
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BrewError::not_found("dry hop notifications", id))
    }

    /// Cancels and removes the reminder of one entry, if any.
    pub async fn cancel_notification(&self, id: &str, entry_id: &str) -> Option<Watcher> {
        let watcher = self
            .notifications
            .lock()
            .await
            .get_mut(id)
            .and_then(|watchers| watchers.remove(entry_id))?;
        watcher.cancel();
        Some(watcher)
    }

    /// Forgets a recipe, cancelling all of its pending reminders.
    pub async fn remove_recipe(&self, id: &str) {
        self.entries.lock().await.remove(id);
        let watchers = self.notifications.lock().await.remove(id);
        for watcher in watchers.into_iter().flat_map(|w| w.into_values()) {
            watcher.cancel();
        }
    }
}
