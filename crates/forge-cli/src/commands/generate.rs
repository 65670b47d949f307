//! One-shot asset generation

use anyhow::{Context, Result};
use forge_core::{
    BackendKind, ForgeConfig, GenerationRequest, InputPayload, QualityMode,
};
use forge_engine::ForgeEngine;
use std::path::{Path, PathBuf};

pub struct GenerateArgs {
    pub backend: String,
    pub prompt: Option<String>,
    pub image: Option<String>,
    pub mesh: Option<String>,
    pub name: Option<String>,
    pub platforms: Vec<String>,
    pub quality: Option<String>,
    pub target_tris: Option<u32>,
    pub texture_size: u32,
    pub seed: Option<u64>,
    pub out: String,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let backend: BackendKind = args
        .backend
        .parse()
        .with_context(|| format!("Unknown backend '{}'", args.backend))?;

    let input = resolve_input(&args)?;
    let name = args.name.clone().unwrap_or_else(|| derive_name(&input));

    let config = ForgeConfig::load().context("Failed to load config")?;
    let quality = match &args.quality {
        Some(q) => q.parse::<QualityMode>()?,
        None => config.generation.default_quality,
    };

    let mut request = GenerationRequest::new(&name, backend, input);
    request.platforms = args.platforms.clone();
    request.params.quality = quality;
    request.params.target_triangles = args.target_tris;
    request.params.texture_size = args.texture_size;
    request.params.seed = args.seed;

    println!(
        "Generating '{}' via {} for {} platform(s)...",
        name,
        backend,
        request.platforms.len()
    );

    let engine = ForgeEngine::new(config);
    let bundle = engine.generate(request).context("Generation failed")?;

    println!(
        "Raw mesh: {} triangles, {} vertices",
        bundle.raw_triangles, bundle.raw_vertices
    );
    for platform in &bundle.platforms {
        println!(
            "  {}: {} triangles, {} LOD tier(s)",
            platform.platform,
            platform.base.triangle_count(),
            platform.lods.len()
        );
        for record in &platform.exports {
            match &record.error {
                None => println!("    {}: {} file(s)", record.format, record.files.len()),
                Some(e) => println!("    {}: FAILED ({})", record.format, e),
            }
        }
    }
    for failure in &bundle.failures {
        eprintln!("  {} FAILED: {}", failure.platform, failure.detail);
    }

    let out_dir = PathBuf::from(&args.out);
    let paths = bundle
        .write_to(&out_dir)
        .with_context(|| format!("Failed to write to {}", out_dir.display()))?;
    println!("Wrote {} file(s) to {}", paths.len(), out_dir.display());

    if !bundle.is_complete() {
        anyhow::bail!("Bundle incomplete: some platforms or formats failed");
    }
    Ok(())
}

fn resolve_input(args: &GenerateArgs) -> Result<InputPayload> {
    match (&args.prompt, &args.image, &args.mesh) {
        (Some(p), None, None) => Ok(InputPayload::Prompt(p.clone())),
        (None, Some(i), None) => Ok(InputPayload::Image(PathBuf::from(i))),
        (None, None, Some(m)) => Ok(InputPayload::Mesh(PathBuf::from(m))),
        (None, None, None) => {
            anyhow::bail!("Provide exactly one of --prompt, --image, --mesh")
        }
        _ => anyhow::bail!("--prompt, --image and --mesh are mutually exclusive"),
    }
}

/// Slug from the prompt's first words, or the input file stem
fn derive_name(input: &InputPayload) -> String {
    match input {
        InputPayload::Prompt(p) => p
            .split_whitespace()
            .take(3)
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
            .replace(|c: char| !c.is_alphanumeric() && c != '_', ""),
        InputPayload::Image(path) | InputPayload::Mesh(path) => Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset")
            .to_string(),
    }
}
