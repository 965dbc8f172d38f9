//! vsrc-export - Source asset conversion tool
//!
//! Converts levels (.bsp), textures (.vtf), materials (.vmt), models
//! (.mdl + companions) and sounds (.wav) to engine-agnostic files, and
//! detail, sound and soundscape scripts to JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use vsrc_common::Diagnostics;

use vsrc_export::manifest::{self, Settings};
use vsrc_export::texture::TextureFormat;
use vsrc_export::{FileEmitter, batch, convert};

#[derive(Parser)]
#[command(name = "vsrc-export")]
#[command(about = "Source asset conversion tool")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert everything listed in a manifest
    Build {
        /// Path to convert.toml manifest
        #[arg(default_value = "convert.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without converting
    Check {
        /// Path to convert.toml manifest
        #[arg(default_value = "convert.toml")]
        manifest: PathBuf,
    },

    /// Convert a single level
    Level {
        /// Input .bsp file
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Material search roots
        #[arg(short, long)]
        materials: Vec<PathBuf>,

        /// Skip brush collision
        #[arg(long)]
        no_collision: bool,

        /// Average normals across smoothing groups
        #[arg(long)]
        smooth: bool,
    },

    /// Convert a single texture
    Texture {
        /// Input .vtf file
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: png, rgba8, bc7, bc5
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Translate a single material script
    Material {
        /// Input .vmt file
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Material search roots for patch includes
        #[arg(short, long)]
        materials: Vec<PathBuf>,
    },

    /// Convert a single model and its companion files
    Model {
        /// Input .mdl file
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Material search roots
        #[arg(short, long)]
        materials: Vec<PathBuf>,

        /// Skin family
        #[arg(short, long, default_value_t = 0)]
        skin: usize,
    },

    /// Re-encode a single sound
    Audio {
        /// Input .wav file
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a detail, sound or soundscape script, or a manifest of them
    Script {
        /// Input .txt or .vbsp file
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a summary of a source file's header
    Info {
        /// Any supported source file
        input: PathBuf,
    },
}

/// Output directory defaults to `converted/` next to the input
fn output_dir(input: &Path, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("converted")
    })
}

fn file_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_else(|| "asset".to_string())
}

fn report(outputs: &[PathBuf], diag: &Diagnostics) {
    for warning in diag.warnings() {
        tracing::debug!("{}", warning);
    }
    tracing::info!("Done! {} files, {} warnings", outputs.len(), diag.len());
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
        Commands::Build { manifest, output } => {
            tracing::info!("Building assets from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            let report = batch::build_all(&config, output.as_deref())?;
            if report.failure_count() > 0 {
                anyhow::bail!("{} of {} assets failed", report.failure_count(), report.jobs.len());
            }
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid! {} assets", config.jobs()?.len());
        }

        Commands::Level {
            input,
            output,
            materials,
            no_collision,
            smooth,
        } => {
            let settings = Settings {
                collision: !no_collision,
                smooth_normals: smooth,
                material_roots: materials,
                ..Default::default()
            };
            let dir = output_dir(&input, output);
            tracing::info!("Converting {:?} -> {:?}", input, dir);
            let mut emitter = FileEmitter::new(&dir, settings.texture_format);
            let mut diag = Diagnostics::new();
            let outputs = convert::convert_level(
                &input,
                &file_stem(&input),
                &settings.geometry_options(),
                &settings.material_set(Path::new("")),
                &mut emitter,
                &mut diag,
            )?;
            report(&outputs, &diag);
        }

        Commands::Texture {
            input,
            output,
            format,
        } => {
            let format = match format {
                Some(f) => TextureFormat::parse(&f)
                    .ok_or_else(|| anyhow::anyhow!("Unknown texture format: {}", f))?,
                None => TextureFormat::default(),
            };
            let dir = output_dir(&input, output);
            tracing::info!("Converting {:?} -> {:?}", input, dir);
            let mut emitter = FileEmitter::new(&dir, format);
            let outputs = convert::convert_texture(&input, &file_stem(&input), &mut emitter)?;
            report(&outputs, &Diagnostics::new());
        }

        Commands::Material {
            input,
            output,
            materials,
        } => {
            let settings = Settings {
                material_roots: materials,
                ..Default::default()
            };
            let dir = output_dir(&input, output);
            tracing::info!("Converting {:?} -> {:?}", input, dir);
            let mut emitter = FileEmitter::new(&dir, settings.texture_format);
            let mut diag = Diagnostics::new();
            let outputs = convert::convert_material(
                &input,
                &file_stem(&input),
                &settings.material_set(Path::new("")),
                &mut emitter,
                &mut diag,
            )?;
            report(&outputs, &diag);
        }

        Commands::Model {
            input,
            output,
            materials,
            skin,
        } => {
            let settings = Settings {
                material_roots: materials,
                ..Default::default()
            };
            let dir = output_dir(&input, output);
            tracing::info!("Converting {:?} -> {:?}", input, dir);
            let mut emitter = FileEmitter::new(&dir, settings.texture_format);
            let mut diag = Diagnostics::new();
            let outputs = convert::convert_model(
                &input,
                &file_stem(&input),
                &settings.model_options(skin),
                &settings.material_set(Path::new("")),
                &mut emitter,
                &mut diag,
            )?;
            report(&outputs, &diag);
        }

        Commands::Audio { input, output } => {
            let dir = output_dir(&input, output);
            tracing::info!("Converting {:?} -> {:?}", input, dir);
            let mut emitter = FileEmitter::new(&dir, TextureFormat::default());
            let outputs = convert::convert_sound(&input, &file_stem(&input), &mut emitter)?;
            report(&outputs, &Diagnostics::new());
        }

        Commands::Script { input, output } => {
            let dir = output_dir(&input, output);
            tracing::info!("Converting {:?} -> {:?}", input, dir);
            let mut emitter = FileEmitter::new(&dir, TextureFormat::default());
            let mut diag = Diagnostics::new();
            let outputs =
                convert::convert_script(&input, &file_stem(&input), None, &mut emitter, &mut diag)?;
            report(&outputs, &diag);
        }

        Commands::Info { input } => {
            println!("{}", convert::describe(&input)?);
        }
    }

    Ok(())
}
