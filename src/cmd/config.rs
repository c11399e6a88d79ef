//! Configuration view and validation commands, `brewday config`.

use anyhow::Result;

use brewday::config::BrewdayConfig;

use super::super::ConfigCommands;

fn redact(value: &Option<String>) -> &str {
    match value {
        Some(_) => "********",
        None => "-",
    }
}

pub fn cmd_config(config: &BrewdayConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_path();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Brewday Configuration");
            println!("=====================");
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No brewday.toml found at {}", config_path.display());
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!("  data_dir = \"{}\"", config.data_dir().display());
            println!("  store = \"{}\"", config.store);
            println!("  database = \"{}\"", config.db_path().display());
            println!();
            println!("[gotify]");
            println!("  url = \"{}\"", config.gotify.url.as_deref().unwrap_or("-"));
            println!(
                "  username = \"{}\"",
                config.gotify.username.as_deref().unwrap_or("-")
            );
            println!("  password = \"{}\"", redact(&config.gotify.password));
            println!("  token = \"{}\"", redact(&config.gotify.token));
            println!();
            println!("[log]");
            println!("  level = \"{}\"", config.log.level);
            println!("  json = {}", config.log.json);
            if let Some(file) = &config.log.file {
                println!("  file = \"{}\"", file.display());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("brewday.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            let defaults = BrewdayConfig {
                data_dir: Some(config.data_dir()),
                ..Default::default()
            };
            defaults.save(&config_path)?;
            println!("Created brewday.toml at {}", config_path.display());
        }
    }

    Ok(())
}
