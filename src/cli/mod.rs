// Command Line Interface Module

pub mod commands;

use clap::{Parser, Subcommand};
use colored::*;

/// eshop - session-based storefront server
#[derive(Parser)]
#[command(name = "eshop")]
#[command(author = "Eshop Team")]
#[command(version)]
#[command(about = "Storefront server with baskets, accounts, orders and PayPal checkout", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the storefront HTTP server
    Serve {
        /// Configuration file path
        #[arg(short, long, default_value = "eshop.toml")]
        config: String,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate
        #[arg(short, long, default_value = "eshop.toml")]
        file: String,
    },

    /// Create the database schema
    InitDb {
        /// Configuration file path
        #[arg(short, long, default_value = "eshop.toml")]
        config: String,

        /// Insert demo products and shipping/payment methods
        #[arg(long)]
        seed: bool,
    },

    /// Print the Argon2 hash of a password
    HashPassword {
        password: String,
    },
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

pub fn print_banner(title: &str) {
    println!(
        "{}",
        format!("\n  eshop v{}  |  {}\n", env!("CARGO_PKG_VERSION"), title)
            .bright_cyan()
            .bold()
    );
}
