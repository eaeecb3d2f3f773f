//! lmd-export - LMD model export tool
//!
//! Decodes LMD model containers and writes engine-neutral JSON scenes
//! (armature, skinned meshes, materials with resolved texture paths).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lmd_format::FormatVersion;

use lmd_export::{convert, manifest};

#[derive(Parser)]
#[command(name = "lmd-export")]
#[command(about = "LMD model export tool")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single LMD file to a JSON scene
    Convert {
        /// Input .lmd file
        input: PathBuf,

        /// Output .json file (default: input with .json extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record layout version ("1.0" or "1.2+")
        #[arg(long, default_value = "1.2+")]
        format_version: FormatVersion,

        /// Texture search directory (default: input's directory)
        #[arg(short, long)]
        textures: Option<PathBuf>,
    },

    /// Print the contents of an LMD file without writing anything
    Info {
        /// Input .lmd file
        input: PathBuf,

        /// Record layout version ("1.0" or "1.2+")
        #[arg(long, default_value = "1.2+")]
        format_version: FormatVersion,
    },

    /// Convert every model listed in a manifest
    Build {
        /// Path to lmd.toml manifest
        #[arg(default_value = "lmd.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Convert {
            input,
            output,
            format_version,
            textures,
        } => {
            let output = output.unwrap_or_else(|| convert::default_output(&input));
            convert::convert_model(&input, &output, format_version, textures.as_deref())?;
        }
        Commands::Info {
            input,
            format_version,
        } => {
            let model = convert::load_model(&input, format_version)?;
            convert::describe_model(&input.to_string_lossy(), &model);
        }
        Commands::Build { manifest, output } => {
            tracing::info!("Building models from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            let count = manifest::build_all(&config, output.as_deref())?;
            tracing::info!("Build complete! {} model(s) converted", count);
        }
    }

    Ok(())
}
