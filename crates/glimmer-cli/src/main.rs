mod simulate;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use glimmer_core::{Attribute, AttributeLayout, SceneConfig};

use crate::simulate::SimulateOptions;

#[derive(Parser)]
#[command(
    name = "glimmer",
    version,
    about = "Glimmer, a GPU sprite lifecycle engine",
    long_about = "Headless driver for the Glimmer sprite engine.\nSimulates sprite lifecycles on a manual clock and inspects texture layouts."
)]
struct Cli {
    /// Scene config TOML file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level, including per-frame phase counts
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive sprites through enter, update and exit and report what happened
    Simulate {
        /// Number of sprites to create
        #[arg(short = 'n', long, default_value_t = 1000)]
        sprites: usize,

        /// Override the config's sprite capacity
        #[arg(long)]
        capacity: Option<usize>,

        /// Simulated milliseconds per frame
        #[arg(long, default_value_t = 16.0)]
        frame_ms: f64,

        /// Give up when a stage needs more frames than this
        #[arg(long, default_value_t = 100_000)]
        max_frames: u64,

        /// Skip the update stage
        #[arg(long)]
        skip_update: bool,

        /// Leave sprites at rest instead of exiting them
        #[arg(long)]
        keep: bool,

        /// Print each frame's phase counts as a JSON line
        #[arg(long)]
        frames: bool,

        /// Write the summary JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the attribute layout and texture geometry
    Layout {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the default config to a TOML file
    Init {
        /// Destination path
        #[arg(default_value = "glimmer.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            sprites,
            capacity,
            frame_ms,
            max_frames,
            skip_update,
            keep,
            frames,
            output,
        } => {
            let mut config = config;
            if let Some(capacity) = capacity {
                config.capacity.desired_sprite_capacity = capacity;
            }
            let options = SimulateOptions {
                sprites,
                frame_ms,
                max_frames,
                skip_update,
                keep,
            };
            cmd_simulate(&config, &options, frames, output.as_deref())
        }
        Commands::Layout { json } => cmd_layout(&config, json),
        Commands::Init { path, force } => cmd_init(&path, force),
    }
}

fn load_config(path: Option<&Path>) -> Result<SceneConfig> {
    let config = match path {
        Some(path) => SceneConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SceneConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn cmd_simulate(
    config: &SceneConfig,
    options: &SimulateOptions,
    print_frames: bool,
    output: Option<&Path>,
) -> Result<()> {
    tracing::info!(sprites = options.sprites, capacity = config.capacity.desired_sprite_capacity, "simulating");
    let start = Instant::now();

    let summary = simulate::run(config, options, move |report| {
        if print_frames {
            match serde_json::to_string(report) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("failed to serialize frame report: {}", e),
            }
        }
    })?;

    tracing::info!(
        frames = summary.frames,
        simulated_ms = summary.simulated_ms,
        wall_ms = start.elapsed().as_secs_f64() * 1000.0,
        "simulation finished"
    );

    let json = serde_json::to_string_pretty(&summary)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("summary written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[derive(Serialize)]
struct AttributeRow {
    name: &'static str,
    offset: usize,
    components: usize,
    interpolated: bool,
}

#[derive(Serialize)]
struct LayoutReport {
    #[serde(flatten)]
    layout: AttributeLayout,
    attributes: Vec<AttributeRow>,
}

fn cmd_layout(config: &SceneConfig, json: bool) -> Result<()> {
    let layout = AttributeLayout::new(
        config.capacity.desired_sprite_capacity,
        config.capacity.max_texture_size,
    )?;
    let attributes: Vec<AttributeRow> = Attribute::ALL
        .iter()
        .map(|&a| AttributeRow {
            name: a.name(),
            offset: a.offset(),
            components: a.components(),
            interpolated: a.is_interpolable(),
        })
        .collect();

    if json {
        let report = LayoutReport { layout, attributes };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("capacity          {}", layout.capacity);
    if layout.capacity < config.capacity.desired_sprite_capacity {
        println!(
            "                  (requested {}, limited by max texture size {})",
            config.capacity.desired_sprite_capacity, config.capacity.max_texture_size
        );
    }
    println!("texture           {} x {} texels", layout.texture_width, layout.texture_height);
    println!("swatch            {} texels, {} values", layout.texels_per_swatch, layout.values_per_swatch);
    println!("swatches per row  {}", layout.swatches_per_row);
    println!();
    println!("{:<20} {:>6} {:>10}  interpolated", "attribute", "offset", "components");
    for row in &attributes {
        println!(
            "{:<20} {:>6} {:>10}  {}",
            row.name,
            row.offset,
            row.components,
            if row.interpolated { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    SceneConfig::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
