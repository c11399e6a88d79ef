//! Timer commands, `brewday timer`. Results are printed as the JSON bodies
//! a request layer would answer with.

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};

use brewday::config::BrewdayConfig;
use brewday::timer::StopTimerRequest;

use super::super::TimerCommands;
use super::open_process;

pub async fn cmd_timer(config: &BrewdayConfig, command: TimerCommands) -> Result<()> {
    let process = open_process(config, None)?;
    match command {
        TimerCommands::Start {
            id,
            prefix,
            minutes,
            suffix,
        } => {
            let millis = minutes * 60_000.0;
            if !millis.is_finite() {
                bail!("--minutes must be a finite number, got {minutes}");
            }
            let duration = (millis.abs() < i64::MAX as f64)
                .then(|| Duration::try_milliseconds(millis.round() as i64))
                .flatten()
                .with_context(|| format!("--minutes {minutes} is out of range"))?;
            let end = process
                .start_timer(&id, duration, &prefix, suffix.as_deref())
                .await?;
            println!("{}", serde_json::to_string(&end)?);
        }
        TimerCommands::Stop {
            id,
            prefix,
            suffix,
            at,
        } => {
            let request = StopTimerRequest {
                stopped_timestamp: at.unwrap_or_else(|| Utc::now().timestamp()),
            };
            process
                .stop_timer(&id, request, &prefix, suffix.as_deref())
                .await?;
            println!("{}", serde_json::to_string(&request)?);
        }
        TimerCommands::Duration { id, prefix, suffix } => {
            let duration = process
                .real_duration(&id, &prefix, suffix.as_deref())
                .await?;
            println!("{}", serde_json::to_string(&duration)?);
        }
    }
    Ok(())
}
