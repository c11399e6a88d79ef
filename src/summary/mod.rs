//! Incrementally built brew report, frozen once at the end of the brew.
//!
//! Each process stage appends a [`SummaryEntry`] to the recipe's
//! [`SummaryDocument`]. Evaporation and efficiency are only stored as
//! scalars; they are rendered, together with the timeline, when the document
//! is closed. After [`SummaryRecorder::close`] the document is read-only:
//! further writes and a second close fail with `InvalidState`.

pub mod markdown;
pub mod sqlite;

pub use markdown::MarkdownPrinter;
pub use sqlite::SqliteSummaryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{BrewError, Result, require_recipe_id};
use crate::timeline::TimelineStore;

/// One milestone of the brew day as recorded in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryEntry {
    MashTemp {
        temperature: f64,
        notes: String,
    },
    Rast {
        temperature: f64,
        duration: f64,
        notes: String,
    },
    LauternNotes {
        notes: String,
    },
    Hopping {
        name: String,
        amount: f32,
        alpha: f32,
        duration: f32,
        notes: String,
    },
    VolumeBeforeBoil {
        volume: f32,
        notes: String,
    },
    VolumeAfterBoil {
        volume: f32,
        notes: String,
    },
    Cooling {
        temperature: f32,
        time: f32,
        notes: String,
    },
    PreFermentation {
        volume: f32,
        sg: f32,
        notes: String,
    },
    YeastStart {
        temperature: String,
        notes: String,
    },
    SgMeasurement {
        date: DateTime<Utc>,
        gravity: f32,
        is_final: bool,
        notes: String,
    },
    MainFermentationAlcohol {
        alcohol: f32,
    },
    DryHop {
        name: String,
        amount: f32,
    },
    PreBottlingVolume {
        volume: f32,
    },
    Bottling(BottlingInfo),
    SecondaryFermentation {
        days: u32,
        notes: String,
    },
}

impl SummaryEntry {
    /// Heading of the report section the entry belongs to.
    pub fn section(&self) -> &'static str {
        match self {
            SummaryEntry::MashTemp { .. } | SummaryEntry::Rast { .. } => "Mash",
            SummaryEntry::LauternNotes { .. } => "Lautern",
            SummaryEntry::Hopping { .. }
            | SummaryEntry::VolumeBeforeBoil { .. }
            | SummaryEntry::VolumeAfterBoil { .. } => "Hopping",
            SummaryEntry::Cooling { .. } => "Cooling",
            SummaryEntry::PreFermentation { .. } => "Pre fermentation",
            SummaryEntry::YeastStart { .. } => "Yeast start",
            SummaryEntry::SgMeasurement { .. } => "SG measurement",
            SummaryEntry::MainFermentationAlcohol { .. } => "Alcohol",
            SummaryEntry::DryHop { .. } => "Dry hop",
            SummaryEntry::PreBottlingVolume { .. } => "Pre bottling",
            SummaryEntry::Bottling(_) => "Bottle",
            SummaryEntry::SecondaryFermentation { .. } => "Secondary fermentation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottlingInfo {
    /// Target carbonation in g/L
    pub carbonation: f32,
    pub alcohol: f32,
    /// Priming sugar in grams
    pub sugar: f32,
    pub sugar_type: String,
    pub temperature: f32,
    /// Volume before adding sugar, in liters
    pub volume: f32,
    pub notes: String,
}

/// Per-recipe report state.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDocument {
    pub recipe_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<SummaryEntry>,
    pub evaporation: f32,
    pub efficiency: f32,
    /// Frozen rendering, set once by close.
    pub rendered: Option<String>,
}

impl SummaryDocument {
    pub fn new(recipe_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            title: title.into(),
            created_at: Utc::now(),
            entries: Vec::new(),
            evaporation: 0.0,
            efficiency: 0.0,
            rendered: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rendered.is_some()
    }

    /// What a rendering of this document depends on besides the title.
    pub fn revision(&self) -> Revision {
        Revision {
            entries: self.entries.len(),
            evaporation: self.evaporation,
            efficiency: self.efficiency,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error(&self.recipe_id));
        }
        Ok(())
    }
}

fn closed_error(id: &str) -> BrewError {
    BrewError::InvalidState(format!("summary for recipe {} is already closed", id))
}

fn changed_error(id: &str) -> BrewError {
    BrewError::InvalidState(format!("summary for recipe {} changed while closing", id))
}

/// Entries are append-only, so their count together with the scalars
/// identifies the state a rendering was made from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Revision {
    pub entries: usize,
    pub evaporation: f32,
    pub efficiency: f32,
}

/// Attempts [`SummaryRecorder::close`] makes before giving up on a document
/// that keeps changing underneath it.
const CLOSE_ATTEMPTS: usize = 3;

/// Deferred scalars rendered only at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Evaporation,
    Efficiency,
}

impl Scalar {
    pub fn column(&self) -> &'static str {
        match self {
            Scalar::Evaporation => "evaporation",
            Scalar::Efficiency => "efficiency",
        }
    }
}

/// Renders a closed document. Implementations decide the file format.
pub trait Printer: Send + Sync {
    /// File extension of the rendering, without the dot.
    fn extension(&self) -> &'static str;
    fn print(&self, document: &SummaryDocument, timeline: &[String]) -> Result<String>;
}

/// Storage of summary documents keyed by recipe id.
///
/// Writes to an unknown recipe are `NotFound`, writes to a closed document
/// are `InvalidState`.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Creates an empty open document, replacing any existing one.
    async fn create(&self, id: &str, title: &str) -> Result<()>;
    async fn get(&self, id: &str) -> Result<SummaryDocument>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn append(&self, id: &str, entry: SummaryEntry) -> Result<()>;
    async fn set_scalar(&self, id: &str, scalar: Scalar, value: f32) -> Result<()>;
    /// Stores the frozen rendering made from `revision`. Fails with
    /// `InvalidState` if the document is already closed or no longer matches
    /// `revision`.
    async fn close(&self, id: &str, rendered: String, revision: Revision) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    documents: Mutex<HashMap<String, SummaryDocument>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_open<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut SummaryDocument) -> R,
    ) -> Result<R> {
        let mut documents = self.documents.lock().await;
        let doc = documents
            .get_mut(id)
            .ok_or_else(|| BrewError::not_found("summary", id))?;
        doc.ensure_open()?;
        Ok(f(doc))
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn create(&self, id: &str, title: &str) -> Result<()> {
        self.documents
            .lock()
            .await
            .insert(id.to_string(), SummaryDocument::new(id, title));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<SummaryDocument> {
        self.documents
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BrewError::not_found("summary", id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.documents.lock().await.remove(id);
        Ok(())
    }

    async fn append(&self, id: &str, entry: SummaryEntry) -> Result<()> {
        self.with_open(id, |doc| doc.entries.push(entry)).await
    }

    async fn set_scalar(&self, id: &str, scalar: Scalar, value: f32) -> Result<()> {
        self.with_open(id, |doc| match scalar {
            Scalar::Evaporation => doc.evaporation = value,
            Scalar::Efficiency => doc.efficiency = value,
        })
        .await
    }

    async fn close(&self, id: &str, rendered: String, revision: Revision) -> Result<()> {
        self.with_open(id, |doc| {
            if doc.revision() != revision {
                return Err(changed_error(id));
            }
            doc.rendered = Some(rendered);
            Ok(())
        })
        .await?
    }
}

/// Records milestones into a [`SummaryStore`] and renders the final report
/// through a [`Printer`].
pub struct SummaryRecorder {
    store: Arc<dyn SummaryStore>,
    timelines: Arc<dyn TimelineStore>,
    printer: Arc<dyn Printer>,
}

impl SummaryRecorder {
    pub fn new(
        store: Arc<dyn SummaryStore>,
        timelines: Arc<dyn TimelineStore>,
        printer: Arc<dyn Printer>,
    ) -> Self {
        Self {
            store,
            timelines,
            printer,
        }
    }

    /// Opens a fresh report for a recipe.
    pub async fn add_summary(&self, id: &str, title: &str) -> Result<()> {
        require_recipe_id(id)?;
        self.store.create(id, title).await
    }

    pub async fn delete_summary(&self, id: &str) -> Result<()> {
        self.store.delete(id).await
    }

    pub async fn document(&self, id: &str) -> Result<SummaryDocument> {
        require_recipe_id(id)?;
        self.store.get(id).await
    }

    async fn append(&self, id: &str, entry: SummaryEntry) -> Result<()> {
        require_recipe_id(id)?;
        self.store.append(id, entry).await
    }

    pub async fn add_mash_temp(&self, id: &str, temperature: f64, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::MashTemp {
                temperature,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_rast(&self, id: &str, temperature: f64, duration: f64, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::Rast {
                temperature,
                duration,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_lautern_notes(&self, id: &str, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::LauternNotes {
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_hopping(
        &self,
        id: &str,
        name: &str,
        amount: f32,
        alpha: f32,
        duration: f32,
        notes: &str,
    ) -> Result<()> {
        self.append(
            id,
            SummaryEntry::Hopping {
                name: name.to_string(),
                amount,
                alpha,
                duration,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_volume_before_boil(&self, id: &str, volume: f32, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::VolumeBeforeBoil {
                volume,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_volume_after_boil(&self, id: &str, volume: f32, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::VolumeAfterBoil {
                volume,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_cooling(&self, id: &str, temperature: f32, time: f32, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::Cooling {
                temperature,
                time,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_pre_fermentation(&self, id: &str, volume: f32, sg: f32, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::PreFermentation {
                volume,
                sg,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_yeast_start(&self, id: &str, temperature: &str, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::YeastStart {
                temperature: temperature.to_string(),
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_sg_measurement(
        &self,
        id: &str,
        date: DateTime<Utc>,
        gravity: f32,
        is_final: bool,
        notes: &str,
    ) -> Result<()> {
        self.append(
            id,
            SummaryEntry::SgMeasurement {
                date,
                gravity,
                is_final,
                notes: notes.to_string(),
            },
        )
        .await
    }

    pub async fn add_main_fermentation_alcohol(&self, id: &str, alcohol: f32) -> Result<()> {
        self.append(id, SummaryEntry::MainFermentationAlcohol { alcohol })
            .await
    }

    pub async fn add_dry_hop(&self, id: &str, name: &str, amount: f32) -> Result<()> {
        self.append(
            id,
            SummaryEntry::DryHop {
                name: name.to_string(),
                amount,
            },
        )
        .await
    }

    pub async fn add_pre_bottling_volume(&self, id: &str, volume: f32) -> Result<()> {
        self.append(id, SummaryEntry::PreBottlingVolume { volume })
            .await
    }

    pub async fn add_bottling(&self, id: &str, bottling: BottlingInfo) -> Result<()> {
        self.append(id, SummaryEntry::Bottling(bottling)).await
    }

    pub async fn add_secondary_fermentation(&self, id: &str, days: u32, notes: &str) -> Result<()> {
        self.append(
            id,
            SummaryEntry::SecondaryFermentation {
                days,
                notes: notes.to_string(),
            },
        )
        .await
    }

    /// Stores the evaporation rate in %/h. Rendered only at close.
    pub async fn add_evaporation(&self, id: &str, rate: f32) -> Result<()> {
        require_recipe_id(id)?;
        self.store.set_scalar(id, Scalar::Evaporation, rate).await
    }

    /// Stores the brewhouse efficiency in percent. Rendered only at close.
    pub async fn add_efficiency(&self, id: &str, percentage: f32) -> Result<()> {
        require_recipe_id(id)?;
        self.store.set_scalar(id, Scalar::Efficiency, percentage).await
    }

    /// Renders the document with its timeline and freezes it.
    ///
    /// Unset evaporation or efficiency are rendered as zero.
    pub async fn close(&self, id: &str) -> Result<()> {
        require_recipe_id(id)?;
        let mut attempt = 1;
        loop {
            let document = self.store.get(id).await?;
            document.ensure_open()?;
            let timeline = match self.timelines.get_timeline(id).await {
                Ok(timeline) => timeline,
                Err(e) if e.is_not_found() => {
                    warn!(recipe_id = id, "Closing summary without a timeline");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            let rendered = self.printer.print(&document, &timeline)?;
            match self.store.close(id, rendered, document.revision()).await {
                Ok(()) => {
                    info!(recipe_id = id, entries = document.entries.len(), "Summary closed");
                    return Ok(());
                }
                // A write landed after the read; render again unless it closed.
                Err(BrewError::InvalidState(reason)) if attempt < CLOSE_ATTEMPTS => {
                    debug!(recipe_id = id, attempt, %reason, "Summary changed during close");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The frozen rendering. `InvalidState` until the summary is closed.
    pub async fn get_summary(&self, id: &str) -> Result<String> {
        require_recipe_id(id)?;
        self.store.get(id).await?.rendered.ok_or_else(|| {
            BrewError::InvalidState(format!("summary for recipe {} is not closed yet", id))
        })
    }

    pub fn get_extension(&self) -> &'static str {
        self.printer.extension()
    }

    /// Downloadable artifact: `("{id}.{ext}", bytes)`.
    pub async fn artifact(&self, id: &str) -> Result<(String, Vec<u8>)> {
        let summary = self.get_summary(id).await?;
        Ok((
            format!("{}.{}", id, self.get_extension()),
            summary.into_bytes(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::MemoryTimelineStore;

    fn recorder() -> (SummaryRecorder, Arc<MemoryTimelineStore>) {
        let timelines = Arc::new(MemoryTimelineStore::new());
        let recorder = SummaryRecorder::new(
            Arc::new(MemorySummaryStore::new()),
            timelines.clone(),
            Arc::new(MarkdownPrinter),
        );
        (recorder, timelines)
    }

    #[tokio::test]
    async fn test_writes_to_unknown_summary_are_not_found() {
        let (recorder, _) = recorder();
        let err = recorder.add_mash_temp("1", 66.0, "").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_entries_keep_insertion_order() {
        let (recorder, _) = recorder();
        recorder.add_summary("1", "Pale Ale").await.unwrap();
        recorder.add_mash_temp("1", 66.0, "stable").await.unwrap();
        recorder.add_rast("1", 63.0, 45.0, "").await.unwrap();
        recorder.add_lautern_notes("1", "clear").await.unwrap();
        let doc = recorder.document("1").await.unwrap();
        let sections: Vec<&str> = doc.entries.iter().map(SummaryEntry::section).collect();
        assert_eq!(sections, vec!["Mash", "Mash", "Lautern"]);
    }

    #[tokio::test]
    async fn test_close_without_scalars_renders_zero_calculations() {
        let (recorder, _) = recorder();
        recorder.add_summary("1", "Pale Ale").await.unwrap();
        recorder.close("1").await.unwrap();
        let summary = recorder.get_summary("1").await.unwrap();
        assert!(summary.contains("## Calculations"));
        assert!(summary.contains("- **Evaporation**: 0.00%/h"));
        assert!(summary.contains("- **Efficiency**: 0.00%"));
    }

    #[tokio::test]
    async fn test_scalars_render_only_at_close() {
        let (recorder, timelines) = recorder();
        recorder.add_summary("1", "Pale Ale").await.unwrap();
        timelines.add_timeline("1").await.unwrap();
        recorder.add_evaporation("1", 10.5).await.unwrap();
        recorder.add_efficiency("1", 72.25).await.unwrap();
        assert!(recorder.get_summary("1").await.is_err());
        recorder.close("1").await.unwrap();
        let summary = recorder.get_summary("1").await.unwrap();
        assert!(summary.contains("- **Evaporation**: 10.50%/h"));
        assert!(summary.contains("- **Efficiency**: 72.25%"));
        assert!(summary.contains("Initialized Recipe"));
    }

    #[tokio::test]
    async fn test_closed_summary_rejects_writes_and_second_close() {
        let (recorder, _) = recorder();
        recorder.add_summary("1", "Pale Ale").await.unwrap();
        recorder.close("1").await.unwrap();
        assert!(matches!(
            recorder.add_dry_hop("1", "Citra(1)", 50.0).await,
            Err(BrewError::InvalidState(_))
        ));
        assert!(matches!(
            recorder.add_efficiency("1", 70.0).await,
            Err(BrewError::InvalidState(_))
        ));
        assert!(matches!(
            recorder.close("1").await,
            Err(BrewError::InvalidState(_))
        ));
    }

    /// Lets one write land right after the first read of a document.
    struct InterleavedStore {
        inner: MemorySummaryStore,
        pending: std::sync::Mutex<Option<SummaryEntry>>,
    }

    #[async_trait]
    impl SummaryStore for InterleavedStore {
        async fn create(&self, id: &str, title: &str) -> Result<()> {
            self.inner.create(id, title).await
        }
        async fn get(&self, id: &str) -> Result<SummaryDocument> {
            let document = self.inner.get(id).await?;
            let pending = self.pending.lock().unwrap().take();
            if let Some(entry) = pending {
                self.inner.append(id, entry).await?;
            }
            Ok(document)
        }
        async fn delete(&self, id: &str) -> Result<()> {
            self.inner.delete(id).await
        }
        async fn append(&self, id: &str, entry: SummaryEntry) -> Result<()> {
            self.inner.append(id, entry).await
        }
        async fn set_scalar(&self, id: &str, scalar: Scalar, value: f32) -> Result<()> {
            self.inner.set_scalar(id, scalar, value).await
        }
        async fn close(&self, id: &str, rendered: String, revision: Revision) -> Result<()> {
            self.inner.close(id, rendered, revision).await
        }
    }

    #[tokio::test]
    async fn test_close_renders_entries_appended_while_closing() {
        let store = Arc::new(InterleavedStore {
            inner: MemorySummaryStore::new(),
            pending: std::sync::Mutex::new(None),
        });
        let recorder = SummaryRecorder::new(
            store.clone(),
            Arc::new(MemoryTimelineStore::new()),
            Arc::new(MarkdownPrinter),
        );
        recorder.add_summary("1", "Pale Ale").await.unwrap();
        *store.pending.lock().unwrap() = Some(SummaryEntry::DryHop {
            name: "Citra(1)".to_string(),
            amount: 50.0,
        });

        recorder.close("1").await.unwrap();
        let summary = recorder.get_summary("1").await.unwrap();
        assert!(summary.contains("Citra(1)"), "{summary}");
        assert_eq!(store.inner.get("1").await.unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn test_get_summary_before_close_is_invalid_state() {
        let (recorder, _) = recorder();
        recorder.add_summary("1", "Pale Ale").await.unwrap();
        assert!(matches!(
            recorder.get_summary("1").await,
            Err(BrewError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_artifact_is_named_after_recipe() {
        let (recorder, _) = recorder();
        recorder.add_summary("42", "Stout").await.unwrap();
        recorder.close("42").await.unwrap();
        let (name, bytes) = recorder.artifact("42").await.unwrap();
        assert_eq!(name, "42.md");
        assert_eq!(recorder.get_extension(), "md");
        assert!(String::from_utf8(bytes).unwrap().starts_with("# Summary"));
    }

    #[test]
    fn test_entry_serializes_with_kind_tag() {
        let entry = SummaryEntry::DryHop {
            name: "Citra(1)".to_string(),
            amount: 50.0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "dry_hop");
        let back: SummaryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
