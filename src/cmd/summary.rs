//! Brew report commands, `brewday summary`.

use anyhow::{Context, Result};

use brewday::config::BrewdayConfig;

use super::super::SummaryCommands;
use super::open_process;

pub async fn cmd_summary(config: &BrewdayConfig, command: SummaryCommands) -> Result<()> {
    let process = open_process(config, None)?;
    match command {
        SummaryCommands::Close { id } => {
            process.summaries().close(&id).await?;
            println!("Summary for recipe {} closed", id);
        }
        SummaryCommands::Show { id } => {
            print!("{}", process.summaries().get_summary(&id).await?);
        }
        SummaryCommands::Export { id, output } => {
            let (name, bytes) = process.summaries().artifact(&id).await?;
            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let path = output.join(name);
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
