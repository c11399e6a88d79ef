use anyhow::Result;

use brewday::config::BrewdayConfig;

use super::super::TimelineCommands;
use super::open_process;

pub async fn cmd_timeline(config: &BrewdayConfig, command: TimelineCommands) -> Result<()> {
    let process = open_process(config, None)?;
    match command {
        TimelineCommands::Add { id, message } => {
            process.timelines().add_event(&id, &message).await?;
        }
        TimelineCommands::Show { id } => {
            for line in process.timelines().get_timeline(&id).await? {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
