//! Resolved platform profile listing

use anyhow::{Context, Result};
use forge_conform::PlatformProfile;
use forge_core::ForgeConfig;

pub fn run() -> Result<()> {
    let config = ForgeConfig::load().context("Failed to load config")?;
    let table = config.resolved_platforms();

    let mut names: Vec<&String> = table.keys().collect();
    names.sort();

    for name in names {
        let limits = &table[name];
        match PlatformProfile::from_limits(name, limits) {
            Ok(profile) => {
                let lods = if profile.lod_ratios.is_empty() {
                    "disabled".to_string()
                } else {
                    profile
                        .lod_ratios
                        .iter()
                        .map(|r| format!("{:.2}", r))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                let formats = profile
                    .formats
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{}", profile.name);
                println!("  max triangles: {}", profile.max_triangles);
                println!("  max texture:   {}", profile.max_texture_size);
                println!("  lod ratios:    {}", lods);
                println!("  formats:       {}", formats);
            }
            Err(e) => eprintln!("{}: invalid profile ({})", name, e),
        }
    }
    Ok(())
}
