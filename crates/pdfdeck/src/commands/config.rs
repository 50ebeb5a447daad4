use anyhow::Result;
use colored::Colorize;

use crate::cli::ConfigCommands;
use crate::config::{Config, Settings};

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(),
        ConfigCommands::Set { key, value } => set(&key, &value),
    }
}

fn show() -> Result<()> {
    let path = Config::path()?;
    let exists = path.exists();
    let config = if exists {
        Config::load_from(&path)?
    } else {
        Config::default()
    };
    let settings = Settings::from_env(&config);

    println!("{} {}", "Config file:".bold(), path.display());
    if !exists {
        println!("  {}", "(not created yet, showing defaults)".dimmed());
    }
    println!();
    for (key, value) in entries(&settings) {
        println!("  {:<22} {value}", key.cyan());
    }
    Ok(())
}

fn set(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_or_default();
    config.set(key, value)?;
    let path = config.save()?;

    let shown = if key == "narration.api_key" {
        "****"
    } else {
        value
    };
    println!("{} {key} = {shown}", "Set".green().bold());
    println!("  {}", format!("saved to {}", path.display()).dimmed());
    Ok(())
}

fn entries(settings: &Settings) -> Vec<(&'static str, String)> {
    vec![
        ("service.url", settings.service_url.clone()),
        ("service.timeout_secs", settings.timeout_secs.to_string()),
        (
            "service.max_upload_mb",
            (settings.max_upload_bytes / (1024 * 1024)).to_string(),
        ),
        ("narration.enabled", settings.narration_enabled.to_string()),
        ("narration.model", settings.model.clone()),
        ("narration.max_tokens", settings.max_tokens.to_string()),
        ("narration.api_key", settings.masked_api_key()),
        (
            "defaults.theme",
            settings.theme.clone().unwrap_or_else(|| "dark".to_string()),
        ),
        ("defaults.windowed", settings.windowed.to_string()),
    ]
}
