//! Backend listing and capability info

use anyhow::{Context, Result};
use forge_backend::BackendStatus;
use forge_core::{BackendKind, ForgeConfig};
use forge_engine::ForgeEngine;

pub fn run_list(format: &str) -> Result<()> {
    let config = ForgeConfig::load().context("Failed to load config")?;
    let engine = ForgeEngine::new(config);
    let listings = engine.list_available_models();

    match format {
        "json" => {
            let rows: Vec<serde_json::Value> = listings
                .iter()
                .map(|l| {
                    serde_json::json!({
                        "backend": l.kind.to_string(),
                        "available": l.status == BackendStatus::Available,
                        "status": status_label(&l.status),
                        "info": l.info,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            for l in &listings {
                let (footprint, latency) = match &l.info {
                    Some(info) => (
                        format!("{} MB", info.footprint_mb),
                        format!("~{:.0}s", info.approx_latency_secs),
                    ),
                    None => ("-".to_string(), "-".to_string()),
                };
                println!(
                    "{:<14} {:<12} {:>10} {:>6}",
                    l.kind.to_string(),
                    status_label(&l.status),
                    footprint,
                    latency
                );
            }
        }
    }
    Ok(())
}

pub fn run_info(backend: &str) -> Result<()> {
    let kind: BackendKind = backend
        .parse()
        .with_context(|| format!("Unknown backend '{}'", backend))?;

    let config = ForgeConfig::load().context("Failed to load config")?;
    let engine = ForgeEngine::new(config);
    let info = engine
        .model_info(kind)
        .with_context(|| format!("Backend '{}' unavailable", backend))?;

    println!("Backend:       {}", info.name);
    println!("Inputs:        {}", info.supported_inputs.join(", "));
    println!("Footprint:     {} MB", info.footprint_mb);
    println!("Latency:       ~{:.0}s", info.approx_latency_secs);
    println!(
        "Deterministic: {} ({})",
        info.deterministic,
        if info.deterministic {
            "results are cached"
        } else {
            "results are never cached"
        }
    );
    Ok(())
}

fn status_label(status: &BackendStatus) -> String {
    match status {
        BackendStatus::Available => "available".to_string(),
        BackendStatus::NoApiKey => "no api key".to_string(),
        BackendStatus::Unavailable(reason) => format!("unavailable: {}", reason),
    }
}
