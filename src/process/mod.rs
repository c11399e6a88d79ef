//! Operator actions of a brew day, wired over the stores and registries.
//!
//! [`BrewProcess`] is constructed once and shared. It owns no global state:
//! every collaborator is passed in, so the CLI, tests and any request layer
//! build their own instance.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::dryhop::{DryHopEntry, DryHopRegistry, dry_hop_entries};
use crate::errors::{BrewError, Result, require_recipe_id};
use crate::notify::{Notifier, NotifyOptions};
use crate::recipe::{Recipe, RecipeStatus};
use crate::store::{MemoryStore, RecipeStore};
use crate::summary::{MarkdownPrinter, MemorySummaryStore, SummaryRecorder, SummaryStore};
use crate::timeline::{MemoryTimelineStore, TimelineStore};
use crate::timer::{EndTimestampResponse, RealDurationResponse, StopTimerRequest, TimerTracker};
use crate::watcher::Watcher;

/// Date name prefix under which dry-hop reminder instants are persisted.
pub const DRY_HOP_REMINDER_PREFIX: &str = "dry_hop_notification_";

pub fn dry_hop_reminder_name(entry_id: &str) -> String {
    format!("{}{}", DRY_HOP_REMINDER_PREFIX, entry_id)
}

fn dry_hop_confirmed_name(entry_id: &str) -> String {
    format!("dry_hop_confirmed_{}", entry_id)
}

/// Date name prefix of the main-fermentation SG measurement reminders. The
/// n-th reminder of a series is stored as `main_ferm_notification_{n}`.
pub const SG_REMINDER_PREFIX: &str = "main_ferm_notification_";

/// Date name of the secondary-fermentation fridge reminder.
pub const FRIDGE_REMINDER_NAME: &str = "secondary_ferm_notification";

fn sg_reminder_name(index: usize) -> String {
    format!("{}{}", SG_REMINDER_PREFIX, index)
}

fn sg_reminder_message(index: usize, at: DateTime<Utc>) -> String {
    if at <= Utc::now() {
        format!(
            "Expired SG Measurement Notification. You should have measured on {}",
            at.format("%Y-%m-%d")
        )
    } else if index == 0 {
        "Measure SG for the first time".to_string()
    } else {
        "Measure SG".to_string()
    }
}

fn fridge_reminder_message(at: DateTime<Utc>) -> String {
    if at <= Utc::now() {
        format!(
            "Expired Secondary Fermentation Notification. You should have put in the fridge on {}",
            at.format("%Y-%m-%d")
        )
    } else {
        "Time to put bottles in the fridge".to_string()
    }
}

/// Keeps only the latest series: everything from the last reminder with
/// index 0 onwards, in insertion order. Earlier series were replaced.
fn latest_sg_series(dates: Vec<(String, DateTime<Utc>)>) -> Vec<(String, DateTime<Utc>)> {
    let first = sg_reminder_name(0);
    let start = dates.iter().rposition(|(name, _)| *name == first).unwrap_or(0);
    dates.into_iter().skip(start).collect()
}

pub struct BrewProcess {
    store: Arc<dyn RecipeStore>,
    timelines: Arc<dyn TimelineStore>,
    timers: TimerTracker,
    dry_hops: DryHopRegistry,
    summaries: SummaryRecorder,
    notifier: Option<Arc<dyn Notifier>>,
    /// Fermentation reminder watchers by recipe id, then by date name.
    reminders: Mutex<HashMap<String, HashMap<String, Watcher>>>,
}

impl BrewProcess {
    pub fn new(
        store: Arc<dyn RecipeStore>,
        timelines: Arc<dyn TimelineStore>,
        summaries: Arc<dyn SummaryStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            timers: TimerTracker::new(store.clone()),
            dry_hops: DryHopRegistry::new(),
            summaries: SummaryRecorder::new(summaries, timelines.clone(), Arc::new(MarkdownPrinter)),
            store,
            timelines,
            notifier,
            reminders: Mutex::new(HashMap::new()),
        }
    }

    /// Everything kept in memory; nothing survives the process.
    pub fn in_memory(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryTimelineStore::new()),
            Arc::new(MemorySummaryStore::new()),
            notifier,
        )
    }

    pub fn store(&self) -> &Arc<dyn RecipeStore> {
        &self.store
    }

    pub fn timelines(&self) -> &Arc<dyn TimelineStore> {
        &self.timelines
    }

    pub fn timers(&self) -> &TimerTracker {
        &self.timers
    }

    pub fn dry_hops(&self) -> &DryHopRegistry {
        &self.dry_hops
    }

    pub fn summaries(&self) -> &SummaryRecorder {
        &self.summaries
    }

    /// Stores a recipe and opens its timeline and summary.
    pub async fn create_recipe(&self, recipe: Recipe) -> Result<String> {
        let title = recipe.name.clone();
        let id = self.store.store(recipe).await?;
        self.timelines.add_timeline(&id).await?;
        self.summaries.add_summary(&id, &title).await?;
        info!(recipe_id = %id, name = %title, "Recipe created");
        Ok(id)
    }

    /// Drops a recipe together with its timeline, summary and reminders.
    pub async fn delete_recipe(&self, id: &str) -> Result<()> {
        require_recipe_id(id)?;
        self.dry_hops.remove_recipe(id).await;
        self.forget_reminders(id).await;
        self.timers.forget(id);
        self.store.delete(id).await?;
        self.timelines.delete_timeline(id).await?;
        self.summaries.delete_summary(id).await?;
        info!(recipe_id = id, "Recipe deleted");
        Ok(())
    }

    /// Persists the new status and logs it on the timeline. Any status may
    /// follow any other.
    pub async fn set_status(&self, id: &str, status: RecipeStatus, params: &[String]) -> Result<()> {
        require_recipe_id(id)?;
        self.store.update_status(id, status, params).await?;
        let message = if params.is_empty() {
            format!("Status changed to {}", status)
        } else {
            format!("Status changed to {} ({})", status, params.join(" "))
        };
        self.timelines.add_event(id, &message).await
    }

    pub async fn get_status(&self, id: &str) -> Result<(RecipeStatus, Vec<String>)> {
        require_recipe_id(id)?;
        Ok(self.store.retrieve(id).await?.get_status())
    }

    pub async fn start_timer(
        &self,
        id: &str,
        duration: Duration,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<EndTimestampResponse> {
        let end = self.timers.start_timer(id, duration, prefix, suffix).await?;
        Ok(end.into())
    }

    pub async fn stop_timer(
        &self,
        id: &str,
        request: StopTimerRequest,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<()> {
        let stopped_at = request.stopped_at()?;
        self.timers.stop_timer(id, stopped_at, prefix, suffix).await
    }

    pub async fn real_duration(
        &self,
        id: &str,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<RealDurationResponse> {
        let duration = self.timers.real_duration(id, prefix, suffix).await?;
        Ok(duration.into())
    }

    /// Registers the dry-hop additions of a recipe. Entries already known to
    /// the registry are kept as they are so their reminder flag survives.
    pub async fn load_dry_hops(&self, id: &str) -> Result<Vec<DryHopEntry>> {
        require_recipe_id(id)?;
        let recipe = self.store.retrieve(id).await?;
        for entry in dry_hop_entries(&recipe) {
            if self.dry_hops.get_entry(id, &entry.id).await.is_err() {
                self.dry_hops.add_entry(id, entry).await;
            }
        }
        match self.dry_hops.get_entries(id).await {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    /// Watcher that sends `message` and logs `event` on the timeline.
    fn notification_watcher(
        &self,
        id: &str,
        at: DateTime<Utc>,
        message: String,
        title: String,
        event: String,
    ) -> Watcher {
        let notifier = self.notifier.clone();
        let timelines = self.timelines.clone();
        let id = id.to_string();
        Watcher::schedule(at, move || async move {
            info!(recipe_id = %id, %title, "Reminder triggered");
            if let Some(notifier) = notifier {
                notifier
                    .send(&message, &title, &NotifyOptions::default())
                    .await?;
            }
            timelines.add_event(&id, &event).await?;
            Ok(())
        })
    }

    fn reminder_watcher(
        &self,
        id: &str,
        recipe_name: &str,
        entry: &DryHopEntry,
        at: DateTime<Utc>,
    ) -> Watcher {
        let message = if at <= Utc::now() {
            format!(
                "Expired Dry Hop Notification. You should have added {} on {}",
                entry.name,
                at.format("%Y-%m-%d")
            )
        } else {
            format!("Time to add {} ({:.2}g)", entry.name, entry.amount)
        };
        self.notification_watcher(
            id,
            at,
            message,
            format!("Dry Hop {}", recipe_name),
            format!("Dry hop reminder sent for {}", entry.name),
        )
    }

    fn sg_watcher(&self, id: &str, recipe_name: &str, index: usize, at: DateTime<Utc>) -> Watcher {
        self.notification_watcher(
            id,
            at,
            sg_reminder_message(index, at),
            format!("Main Fermentation {}", recipe_name),
            format!("SG measurement reminder {} sent", index + 1),
        )
    }

    fn fridge_watcher(&self, id: &str, recipe_name: &str, at: DateTime<Utc>) -> Watcher {
        self.notification_watcher(
            id,
            at,
            fridge_reminder_message(at),
            format!("Secondary Fermentation {}", recipe_name),
            "Fridge reminder sent".to_string(),
        )
    }

    /// Starts a fermentation reminder watcher, cancelling the one it replaces.
    async fn track_reminder(&self, id: &str, name: &str, watcher: Watcher) {
        let replaced = self
            .reminders
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .insert(name.to_string(), watcher.clone());
        if let Some(old) = replaced {
            old.cancel();
        }
        watcher.start();
    }

    async fn forget_reminders(&self, id: &str) {
        if let Some(watchers) = self.reminders.lock().await.remove(id) {
            for watcher in watchers.values() {
                watcher.cancel();
            }
        }
    }

    /// Fermentation reminder watchers of a recipe keyed by date name.
    pub async fn fermentation_reminders(&self, id: &str) -> HashMap<String, Watcher> {
        self.reminders
            .lock()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every watcher this process holds for a recipe: dry-hop reminders
    /// keyed by entry id, fermentation reminders keyed by date name.
    pub async fn pending_reminders(&self, id: &str) -> Result<Vec<(String, Watcher)>> {
        let mut watchers: Vec<(String, Watcher)> = match self.dry_hops.get_notifications(id).await {
            Ok(watchers) => watchers.into_iter().collect(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        watchers.extend(self.fermentation_reminders(id).await);
        Ok(watchers)
    }

    /// Schedules a reminder for one dry-hop entry and persists its instant.
    /// A reminder already set for the entry is replaced.
    pub async fn schedule_dry_hop_reminder(
        &self,
        id: &str,
        entry_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Watcher> {
        require_recipe_id(id)?;
        let entry = self.dry_hops.get_entry(id, entry_id).await?;
        let recipe = self.store.retrieve(id).await?;
        self.store
            .add_date(id, at, &dry_hop_reminder_name(entry_id))
            .await?;
        let watcher = self.reminder_watcher(id, &recipe.name, &entry, at);
        self.dry_hops
            .add_notification(id, entry_id, watcher.clone())
            .await?;
        watcher.start();
        self.timelines
            .add_event(
                id,
                &format!(
                    "Dry hop reminder for {} set to {}",
                    entry.name,
                    at.format("%Y-%m-%d %H:%M")
                ),
            )
            .await?;
        Ok(watcher)
    }

    /// Records a dry-hop addition as done and drops its pending reminder.
    pub async fn confirm_dry_hop(&self, id: &str, entry_id: &str) -> Result<()> {
        require_recipe_id(id)?;
        let entry = self.dry_hops.get_entry(id, entry_id).await?;
        self.summaries
            .add_dry_hop(id, &entry.name, entry.amount)
            .await?;
        self.timelines
            .add_event(id, &format!("Added dry hop {}", entry.name))
            .await?;
        self.store
            .add_bool_flag(id, &dry_hop_confirmed_name(entry_id), true)
            .await?;
        if self.dry_hops.cancel_notification(id, entry_id).await.is_some() {
            info!(recipe_id = id, entry_id, "Pending dry hop reminder cancelled");
        }
        Ok(())
    }

    /// Schedules one SG measurement reminder per `unit` step, from
    /// `from + first * unit` through `from + last * unit`. The series
    /// replaces any series scheduled before.
    pub async fn schedule_sg_reminders(
        &self,
        id: &str,
        from: DateTime<Utc>,
        first: u32,
        last: u32,
        unit: Duration,
    ) -> Result<Vec<Watcher>> {
        require_recipe_id(id)?;
        if last < first {
            return Err(BrewError::Validation(format!(
                "last SG reminder ({last}) comes before the first ({first})"
            )));
        }
        if unit <= Duration::zero() {
            return Err(BrewError::Validation(format!(
                "SG reminder interval must be positive, got {unit}"
            )));
        }
        let dates = (first..=last)
            .map(|step| {
                i32::try_from(step)
                    .ok()
                    .and_then(|step| unit.checked_mul(step))
                    .and_then(|offset| from.checked_add_signed(offset))
                    .ok_or_else(|| {
                        BrewError::Validation(format!("SG reminder {step} is out of range"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let recipe = self.store.retrieve(id).await?;

        if let Some(watchers) = self.reminders.lock().await.get_mut(id) {
            watchers.retain(|name, watcher| {
                let stale = name.starts_with(SG_REMINDER_PREFIX);
                if stale {
                    watcher.cancel();
                }
                !stale
            });
        }

        let mut watchers = Vec::with_capacity(dates.len());
        for (index, at) in dates.iter().copied().enumerate() {
            let name = sg_reminder_name(index);
            self.store.add_date(id, at, &name).await?;
            let watcher = self.sg_watcher(id, &recipe.name, index, at);
            self.track_reminder(id, &name, watcher.clone()).await;
            watchers.push(watcher);
        }
        info!(recipe_id = id, count = dates.len(), "SG measurement reminders scheduled");
        self.timelines
            .add_event(
                id,
                &format!(
                    "{} SG measurement reminder(s) set, the first on {}",
                    dates.len(),
                    dates[0].format("%Y-%m-%d %H:%M")
                ),
            )
            .await?;
        Ok(watchers)
    }

    /// Schedules the reminder to move the bottles into the fridge at the end
    /// of secondary fermentation. A reminder set before is replaced.
    pub async fn schedule_fridge_reminder(&self, id: &str, at: DateTime<Utc>) -> Result<Watcher> {
        require_recipe_id(id)?;
        let recipe = self.store.retrieve(id).await?;
        self.store.add_date(id, at, FRIDGE_REMINDER_NAME).await?;
        let watcher = self.fridge_watcher(id, &recipe.name, at);
        self.track_reminder(id, FRIDGE_REMINDER_NAME, watcher.clone())
            .await;
        self.timelines
            .add_event(
                id,
                &format!("Fridge reminder set to {}", at.format("%Y-%m-%d %H:%M")),
            )
            .await?;
        Ok(watcher)
    }

    /// Rebuilds the reminder watchers of a recipe from the persisted
    /// reminder instants, e.g. after a restart. This covers dry-hop, SG
    /// measurement and fridge reminders. Reminders that already have a
    /// watcher, and dry hops that were confirmed, are left alone; expired
    /// reminders fire right away with an "Expired" message.
    ///
    /// Returns the number of watchers started.
    pub async fn rehydrate_watchers(&self, id: &str) -> Result<usize> {
        let entries = self.load_dry_hops(id).await?;
        let recipe = self.store.retrieve(id).await?;
        let pattern = format!("{}*", DRY_HOP_REMINDER_PREFIX);
        // Later dates for the same entry replace earlier ones.
        let dates: HashMap<String, DateTime<Utc>> = self
            .store
            .retrieve_named_dates(id, &pattern)
            .await?
            .into_iter()
            .filter_map(|(name, date)| {
                name.strip_prefix(DRY_HOP_REMINDER_PREFIX)
                    .map(|entry_id| (entry_id.to_string(), date))
            })
            .collect();
        let existing = match self.dry_hops.get_notifications(id).await {
            Ok(watchers) => watchers,
            Err(e) if e.is_not_found() => HashMap::new(),
            Err(e) => return Err(e),
        };

        let mut started = 0;
        for (entry_id, at) in dates {
            if existing.contains_key(&entry_id)
                || self
                    .store
                    .retrieve_bool_flag(id, &dry_hop_confirmed_name(&entry_id))
                    .await?
            {
                continue;
            }
            let Some(entry) = entries.iter().find(|e| e.id == entry_id) else {
                warn!(recipe_id = id, entry_id = %entry_id, "Reminder date for unknown dry hop");
                continue;
            };
            let watcher = self.reminder_watcher(id, &recipe.name, entry, at);
            self.dry_hops
                .add_notification(id, &entry_id, watcher.clone())
                .await?;
            watcher.start();
            started += 1;
        }
        started += self.rehydrate_fermentation_reminders(id, &recipe.name).await?;
        info!(recipe_id = id, started, "Reminders rehydrated");
        Ok(started)
    }

    async fn rehydrate_fermentation_reminders(&self, id: &str, recipe_name: &str) -> Result<usize> {
        let existing = self.fermentation_reminders(id).await;
        let series = latest_sg_series(
            self.store
                .retrieve_named_dates(id, &format!("{}*", SG_REMINDER_PREFIX))
                .await?,
        );
        let mut sg: Vec<(usize, String, DateTime<Utc>)> = Vec::new();
        for (name, at) in series {
            let Some(index) = name
                .strip_prefix(SG_REMINDER_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
            else {
                warn!(recipe_id = id, name = %name, "Unrecognized SG reminder date");
                continue;
            };
            match sg.iter_mut().find(|(i, _, _)| *i == index) {
                Some(slot) => slot.2 = at,
                None => sg.push((index, name, at)),
            }
        }

        let mut started = 0;
        for (index, name, at) in sg {
            if existing.contains_key(&name) {
                continue;
            }
            let watcher = self.sg_watcher(id, recipe_name, index, at);
            self.track_reminder(id, &name, watcher).await;
            started += 1;
        }

        let fridge = self
            .store
            .retrieve_named_dates(id, FRIDGE_REMINDER_NAME)
            .await?
            .pop();
        if let Some((_, at)) = fridge {
            if !existing.contains_key(FRIDGE_REMINDER_NAME) {
                let watcher = self.fridge_watcher(id, recipe_name, at);
                self.track_reminder(id, FRIDGE_REMINDER_NAME, watcher).await;
                started += 1;
            }
        }
        Ok(started)
    }

    /// Closes the summary, marks the recipe finished and returns the report
    /// artifact `("{id}.{ext}", bytes)`.
    pub async fn finish(&self, id: &str) -> Result<(String, Vec<u8>)> {
        require_recipe_id(id)?;
        if self.summaries.document(id).await?.is_closed() {
            return Err(BrewError::InvalidState(format!(
                "recipe {} is already finished",
                id
            )));
        }
        self.set_status(id, RecipeStatus::Finished, &[]).await?;
        self.summaries.close(id).await?;
        self.dry_hops.remove_recipe(id).await;
        self.forget_reminders(id).await;
        self.summaries.artifact(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BrewError;
    use crate::recipe::Hop;
    use crate::watcher::WatcherState;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str, title: &str, _options: &NotifyOptions) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((message.to_string(), title.to_string()));
            Ok(())
        }
    }

    fn ipa() -> Recipe {
        let mut recipe = Recipe {
            name: "West Coast IPA".to_string(),
            ..Default::default()
        };
        for (name, dry) in [("Columbus", false), ("Citra", true), ("Citra", true)] {
            recipe.hopping.hops.push(Hop {
                name: name.to_string(),
                amount: 50.0,
                dry_hop: dry,
                ..Default::default()
            });
        }
        recipe
    }

    async fn process_with_recipe() -> (BrewProcess, Arc<RecordingNotifier>, String) {
        let notifier = Arc::new(RecordingNotifier::default());
        let process = BrewProcess::in_memory(Some(notifier.clone()));
        let id = process.create_recipe(ipa()).await.unwrap();
        (process, notifier, id)
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_create_recipe_opens_timeline_and_summary() {
        let (process, _, id) = process_with_recipe().await;
        let timeline = process.timelines().get_timeline(&id).await.unwrap();
        assert!(timeline[0].ends_with("Initialized Recipe"));
        assert_eq!(
            process.summaries().document(&id).await.unwrap().title,
            "West Coast IPA"
        );
        assert_eq!(process.get_status(&id).await.unwrap().0, RecipeStatus::Created);
    }

    #[tokio::test]
    async fn test_set_status_is_persisted_and_logged() {
        let (process, _, id) = process_with_recipe().await;
        process
            .set_status(&id, RecipeStatus::Mashing, &["rast".to_string(), "2".to_string()])
            .await
            .unwrap();
        let (status, params) = process.get_status(&id).await.unwrap();
        assert_eq!(status, RecipeStatus::Mashing);
        assert_eq!(params, vec!["rast", "2"]);
        let timeline = process.timelines().get_timeline(&id).await.unwrap();
        assert!(timeline.last().unwrap().ends_with("Status changed to mashing (rast 2)"));
    }

    #[tokio::test]
    async fn test_timer_dtos() {
        let (process, _, id) = process_with_recipe().await;
        let first = process
            .start_timer(&id, Duration::minutes(10), "mash", Some("rast_1"))
            .await
            .unwrap();
        let second = process
            .start_timer(&id, Duration::minutes(30), "mash", Some("rast_1"))
            .await
            .unwrap();
        assert_eq!(first, second);

        let (_, start) = process
            .store()
            .retrieve_named_dates(&id, "mash_rast_1_started")
            .await
            .unwrap()
            .pop()
            .unwrap();
        let request = StopTimerRequest {
            stopped_timestamp: (start + Duration::minutes(90)).timestamp(),
        };
        process
            .stop_timer(&id, request, "mash", Some("rast_1"))
            .await
            .unwrap();
        let duration = process
            .real_duration(&id, "mash", Some("rast_1"))
            .await
            .unwrap();
        assert!((duration.real_duration_minutes - 90.0).abs() < 1.0 / 60.0);
    }

    #[tokio::test]
    async fn test_load_dry_hops_keeps_reminder_flags() {
        let (process, _, id) = process_with_recipe().await;
        let entries = process.load_dry_hops(&id).await.unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["Citra_1", "Citra_2"]);

        process
            .schedule_dry_hop_reminder(&id, "Citra_1", Utc::now() + Duration::hours(48))
            .await
            .unwrap();
        let entries = process.load_dry_hops(&id).await.unwrap();
        assert!(entries[0].notification_set);
        assert!(!entries[1].notification_set);
    }

    #[tokio::test]
    async fn test_reminder_for_unknown_entry_is_not_found() {
        let (process, _, id) = process_with_recipe().await;
        let err = process
            .schedule_dry_hop_reminder(&id, "Citra_1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BrewError::NotFound { .. }));
        assert!(process.dry_hops().get_notifications(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_due_reminder_notifies_and_logs() {
        let (process, notifier, id) = process_with_recipe().await;
        process.load_dry_hops(&id).await.unwrap();
        let watcher = process
            .schedule_dry_hop_reminder(&id, "Citra_2", Utc::now() + Duration::milliseconds(20))
            .await
            .unwrap();
        settle().await;
        assert_eq!(watcher.state(), WatcherState::Fired);
        assert!(watcher.last_error().is_none());
        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Dry Hop West Coast IPA");
        assert!(sent[0].0.contains("Citra(2)"));
        let timeline = process.timelines().get_timeline(&id).await.unwrap();
        assert!(timeline.iter().any(|l| l.ends_with("Dry hop reminder sent for Citra(2)")));
    }

    #[tokio::test]
    async fn test_confirm_dry_hop_cancels_reminder_and_records_summary() {
        let (process, notifier, id) = process_with_recipe().await;
        process.load_dry_hops(&id).await.unwrap();
        let watcher = process
            .schedule_dry_hop_reminder(&id, "Citra_1", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        process.confirm_dry_hop(&id, "Citra_1").await.unwrap();
        assert_eq!(watcher.state(), WatcherState::Cancelled);
        assert!(notifier.sent.lock().unwrap().is_empty());

        let doc = process.summaries().document(&id).await.unwrap();
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].section(), "Dry hop");
    }

    #[tokio::test]
    async fn test_rehydrate_rebuilds_lost_watchers() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryStore::new());
        let timelines: Arc<dyn TimelineStore> = Arc::new(MemoryTimelineStore::new());
        let summaries: Arc<dyn SummaryStore> = Arc::new(MemorySummaryStore::new());

        let before = BrewProcess::new(
            store.clone(),
            timelines.clone(),
            summaries.clone(),
            Some(notifier.clone()),
        );
        let id = before.create_recipe(ipa()).await.unwrap();
        before.load_dry_hops(&id).await.unwrap();
        let lost = before
            .schedule_dry_hop_reminder(&id, "Citra_1", Utc::now() + Duration::hours(24))
            .await
            .unwrap();
        store
            .add_date(&id, Utc::now() - Duration::days(1), &dry_hop_reminder_name("Citra_2"))
            .await
            .unwrap();
        lost.cancel();
        drop(before);

        let after = BrewProcess::new(store, timelines, summaries, Some(notifier.clone()));
        assert_eq!(after.rehydrate_watchers(&id).await.unwrap(), 2);
        assert_eq!(after.rehydrate_watchers(&id).await.unwrap(), 0);
        settle().await;

        let watchers = after.dry_hops().get_notifications(&id).await.unwrap();
        assert_eq!(watchers["Citra_1"].state(), WatcherState::Pending);
        assert_eq!(watchers["Citra_2"].state(), WatcherState::Fired);
        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.starts_with("Expired Dry Hop Notification"));
    }

    #[tokio::test]
    async fn test_sg_reminders_first_and_follow_up_messages() {
        let (process, notifier, id) = process_with_recipe().await;
        let watchers = process
            .schedule_sg_reminders(&id, Utc::now(), 1, 3, Duration::milliseconds(20))
            .await
            .unwrap();
        assert_eq!(watchers.len(), 3);
        let dates = process
            .store()
            .retrieve_named_dates(&id, "main_ferm_notification_*")
            .await
            .unwrap();
        let names: Vec<&str> = dates.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "main_ferm_notification_0",
                "main_ferm_notification_1",
                "main_ferm_notification_2"
            ]
        );
        for watcher in &watchers {
            watcher.wait().await;
        }

        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(_, title)| title == "Main Fermentation West Coast IPA"));
        let messages: Vec<&str> = sent.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(messages.iter().filter(|m| **m == "Measure SG for the first time").count(), 1);
        assert_eq!(messages.iter().filter(|m| **m == "Measure SG").count(), 2);
    }

    #[tokio::test]
    async fn test_sg_reminders_reject_bad_ranges() {
        let (process, _, id) = process_with_recipe().await;
        let err = process
            .schedule_sg_reminders(&id, Utc::now(), 5, 2, Duration::days(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BrewError::Validation(_)), "{err}");
        let err = process
            .schedule_sg_reminders(&id, Utc::now(), 0, 2, Duration::days(365 * 300_000))
            .await
            .unwrap_err();
        assert!(matches!(err, BrewError::Validation(_)), "{err}");
        assert!(process.fermentation_reminders(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_rescheduled_sg_series_replaces_the_old_one() {
        let (process, notifier, id) = process_with_recipe().await;
        let old = process
            .schedule_sg_reminders(&id, Utc::now(), 1, 4, Duration::days(1))
            .await
            .unwrap();
        process
            .schedule_sg_reminders(&id, Utc::now(), 2, 3, Duration::days(1))
            .await
            .unwrap();
        assert!(old.iter().all(|w| w.state() == WatcherState::Cancelled));
        assert_eq!(process.fermentation_reminders(&id).await.len(), 2);

        let restarted = BrewProcess::new(
            process.store().clone(),
            process.timelines().clone(),
            Arc::new(MemorySummaryStore::new()),
            Some(notifier.clone()),
        );
        assert_eq!(restarted.rehydrate_watchers(&id).await.unwrap(), 2);
        let rebuilt = restarted.fermentation_reminders(&id).await;
        assert!(rebuilt.contains_key("main_ferm_notification_1"));
        assert!(!rebuilt.contains_key("main_ferm_notification_2"));
    }

    #[tokio::test]
    async fn test_rehydrate_rebuilds_fermentation_reminders() {
        let (process, notifier, id) = process_with_recipe().await;
        let store = process.store().clone();
        store
            .add_date(&id, Utc::now() - Duration::days(2), "main_ferm_notification_0")
            .await
            .unwrap();
        store
            .add_date(&id, Utc::now() + Duration::days(1), "main_ferm_notification_1")
            .await
            .unwrap();
        store
            .add_date(&id, Utc::now() - Duration::days(1), FRIDGE_REMINDER_NAME)
            .await
            .unwrap();

        assert_eq!(process.rehydrate_watchers(&id).await.unwrap(), 3);
        assert_eq!(process.rehydrate_watchers(&id).await.unwrap(), 0);
        let watchers = process.fermentation_reminders(&id).await;
        watchers["main_ferm_notification_0"].wait().await;
        watchers[FRIDGE_REMINDER_NAME].wait().await;
        assert_eq!(watchers["main_ferm_notification_1"].state(), WatcherState::Pending);

        let mut sent = notifier.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].0.starts_with("Expired SG Measurement Notification. You should have measured on"));
        assert_eq!(sent[0].1, "Main Fermentation West Coast IPA");
        assert!(sent[1].0.starts_with("Expired Secondary Fermentation Notification. You should have put in the fridge on"));
        assert_eq!(sent[1].1, "Secondary Fermentation West Coast IPA");
    }

    #[tokio::test]
    async fn test_fridge_reminder_is_replaced_and_cancelled_on_delete() {
        let (process, notifier, id) = process_with_recipe().await;
        let first = process
            .schedule_fridge_reminder(&id, Utc::now() + Duration::days(14))
            .await
            .unwrap();
        let second = process
            .schedule_fridge_reminder(&id, Utc::now() + Duration::milliseconds(20))
            .await
            .unwrap();
        assert_eq!(first.state(), WatcherState::Cancelled);
        second.wait().await;
        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![(
                "Time to put bottles in the fridge".to_string(),
                "Secondary Fermentation West Coast IPA".to_string()
            )]
        );

        let pending = process
            .schedule_sg_reminders(&id, Utc::now(), 1, 1, Duration::days(1))
            .await
            .unwrap();
        process.delete_recipe(&id).await.unwrap();
        assert_eq!(pending[0].state(), WatcherState::Cancelled);
        assert!(process.fermentation_reminders(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_rehydrate_skips_confirmed_additions() {
        let (process, notifier, id) = process_with_recipe().await;
        process.load_dry_hops(&id).await.unwrap();
        process
            .schedule_dry_hop_reminder(&id, "Citra_1", Utc::now() + Duration::hours(2))
            .await
            .unwrap();
        process.confirm_dry_hop(&id, "Citra_1").await.unwrap();

        let restarted = BrewProcess::new(
            process.store().clone(),
            process.timelines().clone(),
            Arc::new(MemorySummaryStore::new()),
            Some(notifier.clone()),
        );
        assert_eq!(restarted.rehydrate_watchers(&id).await.unwrap(), 0);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finish_returns_closed_report() {
        let (process, _, id) = process_with_recipe().await;
        process.summaries().add_efficiency(&id, 72.5).await.unwrap();
        let (name, bytes) = process.finish(&id).await.unwrap();
        assert_eq!(name, format!("{}.md", id));
        let report = String::from_utf8(bytes).unwrap();
        assert!(report.contains("- **Efficiency**: 72.50%"));
        assert!(report.contains("Status changed to finished"));
        assert_eq!(process.get_status(&id).await.unwrap().0, RecipeStatus::Finished);
    }

    #[tokio::test]
    async fn test_second_finish_leaves_timeline_untouched() {
        let (process, _, id) = process_with_recipe().await;
        process.finish(&id).await.unwrap();
        let before = process.timelines().get_timeline(&id).await.unwrap();

        let err = process.finish(&id).await.unwrap_err();
        assert!(matches!(err, BrewError::InvalidState(_)), "{err}");
        assert_eq!(process.timelines().get_timeline(&id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_recipe_forgets_everything() {
        let (process, _, id) = process_with_recipe().await;
        process.load_dry_hops(&id).await.unwrap();
        process.delete_recipe(&id).await.unwrap();
        assert!(process.store().retrieve(&id).await.unwrap_err().is_not_found());
        assert!(process.timelines().get_timeline(&id).await.unwrap_err().is_not_found());
        assert!(process.dry_hops().get_entries(&id).await.is_err());
    }
}
