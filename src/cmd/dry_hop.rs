//! Dry-hop reminder and notification commands, `brewday dry-hop`,
//! `brewday notify`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use brewday::config::BrewdayConfig;
use brewday::notify::NotifyOptions;

use super::super::DryHopCommands;
use super::{connect_notifier, open_process};

pub async fn cmd_dry_hop(config: &BrewdayConfig, command: DryHopCommands) -> Result<()> {
    match command {
        DryHopCommands::List { id } => {
            let process = open_process(config, None)?;
            let reminders = process
                .store()
                .retrieve_named_dates(&id, &format!("{}*", brewday::process::DRY_HOP_REMINDER_PREFIX))
                .await?;
            let entries = process.load_dry_hops(&id).await?;
            if entries.is_empty() {
                println!("Recipe {} has no dry hops.", id);
            }
            for entry in entries {
                let reminder_name = brewday::process::dry_hop_reminder_name(&entry.id);
                let reminder = reminders
                    .iter()
                    .rev()
                    .find(|(name, _)| *name == reminder_name)
                    .map(|(_, at)| at.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                let kind = if entry.is_hop { "hop" } else { "ingredient" };
                println!(
                    "{}\t{}\t{:.2}g\t{}\t{}",
                    entry.id, entry.name, entry.amount, kind, reminder
                );
            }
        }
        DryHopCommands::Remind { id, entry, at } => {
            let at = parse_instant(&at)?;
            let process = open_process(config, None)?;
            process.load_dry_hops(&id).await?;
            // Only the persisted instant outlives this process; `dry-hop watch`
            // rebuilds the watcher from it.
            process.schedule_dry_hop_reminder(&id, &entry, at).await?;
            println!("Reminder for {} set to {}", entry, at.to_rfc3339());
        }
        DryHopCommands::Confirm { id, entry } => {
            let process = open_process(config, None)?;
            process.load_dry_hops(&id).await?;
            process.confirm_dry_hop(&id, &entry).await?;
            println!("Dry hop {} recorded", entry);
        }
        DryHopCommands::Watch { id } => {
            let notifier = connect_notifier(&config.gotify).await?;
            let process = open_process(config, notifier)?;
            let started = process.rehydrate_watchers(&id).await?;
            println!("Watching {} reminder(s) for recipe {}", started, id);
            if started == 0 {
                return Ok(());
            }
            let watchers = process.pending_reminders(&id).await?;
            let settled = futures::future::join_all(watchers.iter().map(|(_, w)| w.wait()));
            tokio::select! {
                _ = settled => {
                    for (name, watcher) in &watchers {
                        if let Some(err) = watcher.last_error() {
                            eprintln!("Reminder {} failed: {:#}", name, err);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(recipe_id = %id, "Interrupted, pending reminders stay persisted");
                }
            }
        }
    }
    Ok(())
}

pub(super) fn parse_instant(at: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(at)
        .with_context(|| format!("Invalid reminder instant '{}'", at))?
        .with_timezone(&Utc))
}

pub async fn cmd_notify(
    config: &BrewdayConfig,
    message: &str,
    title: &str,
    markdown: bool,
) -> Result<()> {
    let Some(notifier) = connect_notifier(&config.gotify).await? else {
        anyhow::bail!("Gotify is not configured. Set [gotify] url in brewday.toml or BREWDAY_GOTIFY_URL");
    };
    let options = NotifyOptions {
        markdown,
        ..Default::default()
    };
    notifier.send(message, title, &options).await?;
    println!("Notification sent");
    Ok(())
}
