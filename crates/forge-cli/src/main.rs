//! Forge CLI - Command-line interface for the MeshForge engine

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cache, generate, models, platforms};

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Platform-aware 3D asset generation engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an asset and write its exported files
    Generate {
        /// Backend to run (text_to_3d, image_to_3d, mesh_refiner, remote, mock)
        backend: String,

        /// Text prompt (text_to_3d, remote, mock)
        #[arg(long, short)]
        prompt: Option<String>,

        /// Reference image path (image_to_3d)
        #[arg(long)]
        image: Option<String>,

        /// Prior mesh path (mesh_refiner)
        #[arg(long)]
        mesh: Option<String>,

        /// Asset name (defaults to a slug of the prompt or input file)
        #[arg(long)]
        name: Option<String>,

        /// Target platform profile; repeatable
        #[arg(long = "platform", required = true)]
        platforms: Vec<String>,

        /// Quality preset (fast, balanced, quality)
        #[arg(long)]
        quality: Option<String>,

        /// Target triangle count hint for the backend
        #[arg(long)]
        target_tris: Option<u32>,

        /// Requested texture resolution
        #[arg(long, default_value = "1024")]
        texture_size: u32,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory for exported files
        #[arg(long, short, default_value = "forge_out")]
        out: String,
    },

    /// List backends with availability
    Models {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show a backend's capability descriptor
    Info {
        /// Backend name
        backend: String,
    },

    /// List resolved platform profiles
    Platforms,

    /// Result cache operations
    #[command(subcommand)]
    Cache(cache::CacheCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            backend,
            prompt,
            image,
            mesh,
            name,
            platforms,
            quality,
            target_tris,
            texture_size,
            seed,
            out,
        } => generate::run(generate::GenerateArgs {
            backend,
            prompt,
            image,
            mesh,
            name,
            platforms,
            quality,
            target_tris,
            texture_size,
            seed,
            out,
        }),
        Commands::Models { format } => models::run_list(&format),
        Commands::Info { backend } => models::run_info(&backend),
        Commands::Platforms => platforms::run(),
        Commands::Cache(cmd) => cache::run(cmd),
    }
}
