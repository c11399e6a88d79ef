//! Recipe and status commands, `brewday recipe`, `brewday status`.

use anyhow::{Context, Result};

use brewday::config::BrewdayConfig;
use brewday::recipe::{Recipe, RecipeStatus};

use super::super::{RecipeCommands, StatusCommands};
use super::open_process;

pub async fn cmd_recipe(config: &BrewdayConfig, command: RecipeCommands) -> Result<()> {
    let process = open_process(config, None)?;
    match command {
        RecipeCommands::Add { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read recipe {}", file.display()))?;
            let recipe: Recipe = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse recipe {}", file.display()))?;
            let id = process.create_recipe(recipe).await?;
            println!("{}", id);
        }
        RecipeCommands::List => {
            let recipes = process.store().list().await?;
            if recipes.is_empty() {
                println!("No recipes stored.");
            }
            for recipe in recipes {
                println!("{}\t{}\t{}", recipe.id, recipe.name, recipe.status_string());
            }
        }
        RecipeCommands::Show { id } => {
            let recipe = process.store().retrieve(&id).await?;
            println!("Status: {}", recipe.status_string());
            println!("{}", serde_json::to_string_pretty(recipe.as_ref())?);
        }
        RecipeCommands::Delete { id } => {
            process.delete_recipe(&id).await?;
            println!("Deleted recipe {}", id);
        }
    }
    Ok(())
}

pub async fn cmd_status(config: &BrewdayConfig, command: StatusCommands) -> Result<()> {
    let process = open_process(config, None)?;
    match command {
        StatusCommands::Get { id } => {
            let (status, params) = process.get_status(&id).await?;
            if params.is_empty() {
                println!("{}", status);
            } else {
                println!("{} {}", status, params.join(" "));
            }
        }
        StatusCommands::Set { id, status, params } => {
            let status: RecipeStatus = status.parse()?;
            process.set_status(&id, status, &params).await?;
            println!("Recipe {} is now {}", id, status);
        }
    }
    Ok(())
}
