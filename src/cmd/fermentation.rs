//! Fermentation reminder commands, `brewday fermentation`.

use anyhow::Result;
use chrono::{Duration, Utc};

use brewday::config::BrewdayConfig;

use super::super::{FermentationCommands, ReminderUnit};
use super::dry_hop::parse_instant;
use super::open_process;

pub async fn cmd_fermentation(config: &BrewdayConfig, command: FermentationCommands) -> Result<()> {
    let process = open_process(config, None)?;
    match command {
        FermentationCommands::SgRemind {
            id,
            first,
            last,
            unit,
        } => {
            let unit = match unit {
                ReminderUnit::Days => Duration::days(1),
                ReminderUnit::Hours => Duration::hours(1),
                ReminderUnit::Seconds => Duration::seconds(1),
            };
            let watchers = process
                .schedule_sg_reminders(&id, Utc::now(), first, last, unit)
                .await?;
            for watcher in &watchers {
                println!("SG reminder at {}", watcher.execution_date().to_rfc3339());
            }
        }
        FermentationCommands::FridgeRemind { id, at } => {
            let at = parse_instant(&at)?;
            process.schedule_fridge_reminder(&id, at).await?;
            println!("Fridge reminder set to {}", at.to_rfc3339());
        }
    }
    Ok(())
}
