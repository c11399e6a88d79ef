//! CLI command implementations.
//!
//! | Module     | Commands handled     |
//! |------------|----------------------|
//! | `recipe`   | `Recipe`, `Status`   |
//! | `timer`    | `Timer`              |
//! | `timeline` | `Timeline`           |
//! | `summary`  | `Summary`            |
//! | `dry_hop`  | `DryHop`, `Notify`   |
//! | `fermentation` | `Fermentation`   |
//! | `config`   | `Config`             |

pub mod config;
pub mod dry_hop;
pub mod fermentation;
pub mod recipe;
pub mod summary;
pub mod timeline;
pub mod timer;

pub use config::cmd_config;
pub use dry_hop::{cmd_dry_hop, cmd_notify};
pub use fermentation::cmd_fermentation;
pub use recipe::{cmd_recipe, cmd_status};
pub use summary::cmd_summary;
pub use timeline::cmd_timeline;
pub use timer::cmd_timer;

use anyhow::{Context, Result};
use std::sync::Arc;

use brewday::BrewProcess;
use brewday::config::{BrewdayConfig, GotifyConfig, StoreKind};
use brewday::db::DbHandle;
use brewday::notify::{GotifyNotifier, Notifier};
use brewday::store::SqliteStore;
use brewday::summary::SqliteSummaryStore;
use brewday::timeline::SqliteTimelineStore;

/// Builds the process over the configured backend.
pub fn open_process(
    config: &BrewdayConfig,
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<BrewProcess> {
    match config.store {
        StoreKind::Memory => Ok(BrewProcess::in_memory(notifier)),
        StoreKind::Sqlite => {
            let db = DbHandle::open(&config.db_path())?;
            Ok(BrewProcess::new(
                Arc::new(SqliteStore::new(db.clone())),
                Arc::new(SqliteTimelineStore::new(db.clone())),
                Arc::new(SqliteSummaryStore::new(db)),
                notifier,
            ))
        }
    }
}

/// Connects to Gotify when it is configured.
pub async fn connect_notifier(gotify: &GotifyConfig) -> Result<Option<Arc<dyn Notifier>>> {
    let Some(url) = gotify.url.as_deref().filter(|_| gotify.is_enabled()) else {
        return Ok(None);
    };
    let notifier = match (&gotify.token, &gotify.username, &gotify.password) {
        (Some(token), _, _) => GotifyNotifier::with_token(url, token),
        (None, Some(user), Some(password)) => GotifyNotifier::connect(url, user, password)
            .await
            .context("Failed to connect to gotify")?,
        _ => anyhow::bail!("gotify needs either a token or username and password"),
    };
    Ok(Some(Arc::new(notifier)))
}
