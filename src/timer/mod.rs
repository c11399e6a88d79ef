//! Start/stop/elapsed bookkeeping for named timers.
//!
//! Timers are not running tasks. A timer is a pair of boolean flags plus the
//! start, projected end and stop instants, all held by the [`RecipeStore`].
//! A timer is addressed by recipe id, a prefix (`mash`, `hop`, `rast`) and an
//! optional suffix that tells repeated timers apart (`rast` `2`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::errors::{BrewError, Result, require_recipe_id};
use crate::store::RecipeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Started,
    Stopped,
    End,
}

impl Purpose {
    fn as_str(&self) -> &'static str {
        match self {
            Purpose::Started => "started",
            Purpose::Stopped => "stopped",
            Purpose::End => "end",
        }
    }
}

/// Canonical store name for a timer: `{prefix}[_{suffix}]_{purpose}`.
///
/// The suffix comes before the purpose so `rast_1_end` and `rast_10_end`
/// never share a prefix with each other's purpose names.
pub fn timer_name(prefix: &str, suffix: Option<&str>, purpose: &str) -> String {
    format!("{}_{}", base_name(prefix, suffix), purpose)
}

fn base_name(prefix: &str, suffix: Option<&str>) -> String {
    match suffix.filter(|s| !s.is_empty()) {
        Some(suffix) => format!("{}_{}", prefix, suffix),
        None => prefix.to_string(),
    }
}

/// Derived view over a timer's persisted flags and instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    NotStarted,
    Running {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Stopped {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

impl TimerState {
    /// Folds the persisted primitives into one state, checking that every set
    /// flag is backed by the instants it implies.
    pub fn derive(
        name: &str,
        started: bool,
        stopped: bool,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        stop: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if !started {
            if stopped {
                return Err(BrewError::InvalidState(format!(
                    "timer {} was stopped but never started",
                    name
                )));
            }
            return Ok(TimerState::NotStarted);
        }
        let start = start.ok_or_else(|| missing(name, Purpose::Started))?;
        let end = end.ok_or_else(|| missing(name, Purpose::End))?;
        if !stopped {
            return Ok(TimerState::Running { start, end });
        }
        let stop = stop.ok_or_else(|| missing(name, Purpose::Stopped))?;
        Ok(TimerState::Stopped { start, end, stop })
    }
}

fn missing(name: &str, purpose: Purpose) -> BrewError {
    BrewError::InvalidState(format!(
        "invalid empty date for {} {}",
        name,
        purpose.as_str()
    ))
}

/// Response carrying the projected end of a running timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndTimestampResponse {
    pub end_timestamp: i64,
}

impl From<DateTime<Utc>> for EndTimestampResponse {
    fn from(end: DateTime<Utc>) -> Self {
        Self {
            end_timestamp: end.timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealDurationResponse {
    pub real_duration_minutes: f32,
}

impl From<Duration> for RealDurationResponse {
    fn from(duration: Duration) -> Self {
        Self {
            real_duration_minutes: duration.num_milliseconds() as f32 / 60_000.0,
        }
    }
}

/// Request body for stopping a timer at a real-world instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTimerRequest {
    pub stopped_timestamp: i64,
}

impl StopTimerRequest {
    pub fn stopped_at(&self) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(self.stopped_timestamp, 0).ok_or_else(|| {
            BrewError::Validation(format!(
                "stopped_timestamp {} is out of range",
                self.stopped_timestamp
            ))
        })
    }
}

/// Timer bookkeeping over a [`RecipeStore`].
///
/// Every operation on one timer runs under that timer's own async lock, so
/// two concurrent starts cannot both observe the flag unset. The lock never
/// covers other timers or recipes.
pub struct TimerTracker {
    store: Arc<dyn RecipeStore>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TimerTracker {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn timer_lock(&self, id: &str, prefix: &str, suffix: Option<&str>) -> Arc<tokio::sync::Mutex<()>> {
        let key = format!("{}/{}", id, base_name(prefix, suffix));
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone()
    }

    /// Drops the per-timer locks held for a deleted recipe.
    pub fn forget(&self, id: &str) {
        let prefix = format!("{id}/");
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| !key.starts_with(&prefix));
    }

    async fn last_date(&self, id: &str, name: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.store.retrieve_dates(id, name).await?.pop())
    }

    /// Starts the timer now and returns its projected end, or returns the
    /// end recorded by the first start if the timer was already started.
    pub async fn start_timer(
        &self,
        id: &str,
        duration: Duration,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<DateTime<Utc>> {
        self.start_timer_at(id, Utc::now(), duration, prefix, suffix)
            .await
    }

    /// Like [`TimerTracker::start_timer`] with an explicit current instant.
    pub async fn start_timer_at(
        &self,
        id: &str,
        now: DateTime<Utc>,
        duration: Duration,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<DateTime<Utc>> {
        require_recipe_id(id)?;
        let lock = self.timer_lock(id, prefix, suffix);
        let _guard = lock.lock().await;

        let started_name = timer_name(prefix, suffix, Purpose::Started.as_str());
        let end_name = timer_name(prefix, suffix, Purpose::End.as_str());

        if self.store.retrieve_bool_flag(id, &started_name).await? {
            let end = self
                .last_date(id, &end_name)
                .await?
                .ok_or_else(|| missing(&base_name(prefix, suffix), Purpose::End))?;
            debug!(recipe_id = id, timer = %started_name, %end, "Timer already started");
            return Ok(end);
        }

        if duration < Duration::zero() {
            return Err(BrewError::Validation(format!(
                "timer duration must not be negative, got {duration}"
            )));
        }
        let end = now.checked_add_signed(duration).ok_or_else(|| {
            BrewError::Validation(format!("timer duration {duration} is out of range"))
        })?;
        // Instants first: a flag is never set without the dates it implies.
        self.store.add_date(id, now, &started_name).await?;
        self.store.add_date(id, end, &end_name).await?;
        self.store.add_bool_flag(id, &started_name, true).await?;
        info!(recipe_id = id, timer = %started_name, %end, "Timer started");
        Ok(end)
    }

    /// Records the caller-supplied stop instant. Only the first call has any
    /// effect.
    pub async fn stop_timer(
        &self,
        id: &str,
        stopped_at: DateTime<Utc>,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<()> {
        require_recipe_id(id)?;
        let lock = self.timer_lock(id, prefix, suffix);
        let _guard = lock.lock().await;

        let stopped_name = timer_name(prefix, suffix, Purpose::Stopped.as_str());
        if self.store.retrieve_bool_flag(id, &stopped_name).await? {
            debug!(recipe_id = id, timer = %stopped_name, "Timer already stopped");
            return Ok(());
        }
        self.store.add_date(id, stopped_at, &stopped_name).await?;
        self.store.add_bool_flag(id, &stopped_name, true).await?;
        info!(recipe_id = id, timer = %stopped_name, %stopped_at, "Timer stopped");
        Ok(())
    }

    /// Elapsed time between the recorded start and stop instants.
    pub async fn real_duration(
        &self,
        id: &str,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<Duration> {
        require_recipe_id(id)?;
        let base = base_name(prefix, suffix);
        let start = self
            .last_date(id, &timer_name(prefix, suffix, Purpose::Started.as_str()))
            .await?
            .ok_or_else(|| missing(&base, Purpose::Started))?;
        let stop = self
            .last_date(id, &timer_name(prefix, suffix, Purpose::Stopped.as_str()))
            .await?
            .ok_or_else(|| missing(&base, Purpose::Stopped))?;
        Ok(stop - start)
    }

    pub async fn state(&self, id: &str, prefix: &str, suffix: Option<&str>) -> Result<TimerState> {
        require_recipe_id(id)?;
        let lock = self.timer_lock(id, prefix, suffix);
        let _guard = lock.lock().await;

        let name = |p: Purpose| timer_name(prefix, suffix, p.as_str());
        let started = self
            .store
            .retrieve_bool_flag(id, &name(Purpose::Started))
            .await?;
        let stopped = self
            .store
            .retrieve_bool_flag(id, &name(Purpose::Stopped))
            .await?;
        let start = self.last_date(id, &name(Purpose::Started)).await?;
        let end = self.last_date(id, &name(Purpose::End)).await?;
        let stop = self.last_date(id, &name(Purpose::Stopped)).await?;
        TimerState::derive(&base_name(prefix, suffix), started, stopped, start, end, stop)
    }
}
