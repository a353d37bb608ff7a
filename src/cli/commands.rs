// CLI Command Implementations
// Offline commands; `serve` is run by the binary itself

use anyhow::Context;
use colored::*;
use std::path::Path;

use super::{info, success, warning, Commands};
use crate::config::ShopConfig;
use crate::database::{seed::seed_demo_data, Database};
use crate::security::passwords;

/// Execute a CLI command other than `serve`
pub async fn execute(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Validate { file } => validate_command(&file),
        Commands::InitDb { config, seed } => init_db_command(&config, seed),
        Commands::HashPassword { password } => hash_password_command(&password),
        Commands::Serve { .. } => anyhow::bail!("serve is handled by the server entry point"),
    }
}

fn validate_command(file: &str) -> anyhow::Result<()> {
    info(&format!("Validating configuration file: {}", file.bright_white()));

    if !Path::new(file).exists() {
        anyhow::bail!("Configuration file not found: {}", file);
    }

    let config = ShopConfig::load(file)?;

    success("Configuration is valid");
    println!();
    println!("  {} {}:{}", "Listen:".bright_white(), config.server.bind_addr, config.server.port);
    println!("  {} {}", "Database:".bright_white(), config.database.path);
    println!("  {} {}", "Shop:".bright_white(), config.shop.title);
    println!("  {} {}s", "Session lifetime:".bright_white(), config.session.lifetime_secs);
    println!(
        "  {} {}",
        "PayPal:".bright_white(),
        if config.paypal.enabled {
            format!("{:?}", config.paypal.mode).green()
        } else {
            "disabled".yellow()
        }
    );
    println!();

    Ok(())
}

fn init_db_command(config_path: &str, seed: bool) -> anyhow::Result<()> {
    let config = ShopConfig::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    success(&format!("Schema ready in {}", config.database.path.bright_white()));

    if seed {
        let inserted = seed_demo_data(&db).context("Failed to seed demo data")?;
        if inserted == 0 {
            warning("Tables already contain data, nothing seeded");
        } else {
            success(&format!("Seeded {} demo rows", inserted));
        }
    }

    Ok(())
}

fn hash_password_command(password: &str) -> anyhow::Result<()> {
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let hash = passwords::hash(password).map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("{}", hash);
    Ok(())
}
