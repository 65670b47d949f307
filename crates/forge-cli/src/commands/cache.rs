//! Result cache operations
//!
//! The cache lives inside an engine instance, so these commands
//! report the configured budget and operate on a fresh engine. They
//! exist mostly for scripting against a long-lived engine embedded in
//! another process; a one-shot CLI invocation starts empty.

use anyhow::{Context, Result};
use clap::Subcommand;
use forge_core::ForgeConfig;
use forge_engine::ForgeEngine;

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache configuration and occupancy
    Stats,

    /// Drop every cached bundle
    Clear,
}

pub fn run(cmd: CacheCommands) -> Result<()> {
    let config = ForgeConfig::load().context("Failed to load config")?;
    let engine = ForgeEngine::new(config.clone());

    match cmd {
        CacheCommands::Stats => {
            let stats = engine.cache_stats();
            println!("Enabled:  {}", config.cache.enabled);
            println!("Budget:   {} MB", config.cache.size_mb);
            println!("Entries:  {}", stats.entries);
            println!(
                "Used:     {:.1} MB",
                stats.used_bytes as f64 / (1024.0 * 1024.0)
            );
        }
        CacheCommands::Clear => {
            let removed = engine.clear_cache();
            println!("Removed {} cached bundle(s)", removed);
        }
    }
    Ok(())
}
