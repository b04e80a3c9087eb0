//! phenotex CLI - GLCM texture features for phenotyping imagery

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use phenotex_algorithms::texture::{
    cleaned_feature_maps, sentinel_mean, EdgeMode, GlcmFeature, GlcmParams, QuantizeParams, TextureParams,
    DEFAULT_LEVELS,
};
use phenotex_batch::{BatchEvent, BatchRequest, BatchState, TextureBatch};
use phenotex_core::io::{read_tile, write_tiff, RasterTile};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "phenotex")]
#[command(author, version, about = "GLCM texture features for phenotyping imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a tile
    Info {
        /// Input tile (.tif, .tiff, .png, .jpg, .jpeg)
        input: PathBuf,
    },
    /// Texture descriptors of a single tile
    Glcm {
        /// Input tile
        input: PathBuf,
        /// Odd window size
        #[arg(short, long, default_value = "5")]
        window: usize,
        /// Feature codes (MEA, VAR, HOM, CON, DIS, ENT, COR, SEM)
        #[arg(short, long, value_delimiter = ',')]
        features: Option<Vec<String>>,
        #[command(flatten)]
        glcm: GlcmArgs,
        /// Write each cleaned feature map as a float TIFF into this directory
        #[arg(long)]
        map_dir: Option<PathBuf>,
    },
    /// Texture descriptors for every tile and window size under a directory
    Batch {
        /// Directory searched recursively for tiles
        input_root: Option<PathBuf>,
        /// Directory that receives the per-band ledgers
        output_root: Option<PathBuf>,
        /// JSON batch request; flags given on the command line override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Window sizes (even values are dropped)
        #[arg(long, value_delimiter = ',')]
        windows: Option<Vec<usize>>,
        /// Feature codes (unknown codes are dropped)
        #[arg(short, long, value_delimiter = ',')]
        features: Option<Vec<String>>,
        #[command(flatten)]
        glcm: GlcmArgs,
        /// Request a stop once this many items have been written; the item in
        /// flight still finishes
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Quantization, offset and border options shared by `glcm` and `batch`
#[derive(clap::Args)]
struct GlcmArgs {
    /// Number of gray levels
    #[arg(long)]
    levels: Option<usize>,
    /// Pixel distances between pair samples
    #[arg(long, value_delimiter = ',')]
    steps: Option<Vec<usize>>,
    /// Pair directions in degrees
    #[arg(long, value_delimiter = ',')]
    angles: Option<Vec<f64>>,
    /// Border masking strategy
    #[arg(long, value_enum)]
    edge_mode: Option<EdgeModeArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EdgeModeArg {
    Geometric,
    Contour,
}

impl From<EdgeModeArg> for EdgeMode {
    fn from(arg: EdgeModeArg) -> Self {
        match arg {
            EdgeModeArg::Geometric => EdgeMode::Geometric,
            EdgeModeArg::Contour => EdgeMode::Contour,
        }
    }
}

impl GlcmArgs {
    fn apply(self, quantize: &mut QuantizeParams, glcm: &mut GlcmParams, edge_mode: &mut EdgeMode) {
        if let Some(levels) = self.levels {
            quantize.levels = levels;
        }
        if let Some(steps) = self.steps {
            glcm.steps = steps;
        }
        if let Some(angles) = self.angles {
            glcm.angles = angles;
        }
        if let Some(mode) = self.edge_mode {
            *edge_mode = mode.into();
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_input(path: &Path) -> Result<RasterTile> {
    let pb = spinner("Reading tile...")?;
    let tile = read_tile(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {} ({})", tile.width(), tile.height(), tile.sample_type);
    Ok(tile)
}

fn parse_features(codes: Option<Vec<String>>) -> Result<Vec<GlcmFeature>> {
    match codes {
        None => Ok(GlcmFeature::ALL.to_vec()),
        Some(codes) => codes
            .iter()
            .map(|c| c.parse::<GlcmFeature>().with_context(|| format!("Unknown feature: {}", c)))
            .collect(),
    }
}

fn batch_request(
    input_root: Option<PathBuf>,
    output_root: Option<PathBuf>,
    config: Option<PathBuf>,
    windows: Option<Vec<usize>>,
    features: Option<Vec<String>>,
    glcm: GlcmArgs,
) -> Result<BatchRequest> {
    let mut request = match (config, input_root.clone(), output_root.clone()) {
        (Some(path), _, _) => BatchRequest::from_json_file(&path)?,
        (None, Some(input), Some(output)) => BatchRequest::new(input, output),
        _ => anyhow::bail!("Either --config or both INPUT_ROOT and OUTPUT_ROOT are required"),
    };
    if let Some(input) = input_root {
        request.input_root = input;
    }
    if let Some(output) = output_root {
        request.output_root = output;
    }
    if let Some(windows) = windows {
        request.window_sizes = windows;
    }
    if let Some(features) = features {
        request.features = features;
    }
    glcm.apply(&mut request.quantize, &mut request.glcm, &mut request.edge_mode);
    Ok(request)
}

fn batch_progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn run_batch(request: BatchRequest, limit: Option<usize>) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = TextureBatch::spawn(request, tx).context("Failed to start batch")?;
    let pb = batch_progress_bar()?;
    let mut failed = 0;

    for event in rx.iter() {
        match event {
            BatchEvent::Started { total } => {
                pb.set_length(total as u64);
                if limit == Some(0) {
                    handle.cancel();
                }
            }
            BatchEvent::Progress { done, label, .. } => {
                pb.set_position((done + failed) as u64);
                pb.set_message(label);
                if limit.is_some_and(|n| done >= n) {
                    handle.cancel();
                }
            }
            BatchEvent::ItemFailed { file, window, message } => {
                failed += 1;
                pb.inc(1);
                pb.println(format!("error: {} ({}x{}): {}", file, window, window, message));
            }
            BatchEvent::FileRejected { file, message } => {
                pb.println(format!("skipped: {}: {}", file, message));
            }
            BatchEvent::Completed { processed, failed } => {
                pb.finish_and_clear();
                println!("Completed: {} items written, {} failed", processed, failed);
            }
            BatchEvent::Cancelled { processed } => {
                pb.finish_and_clear();
                println!("Cancelled after {} items", processed);
            }
            BatchEvent::Failed { message } => {
                pb.abandon();
                eprintln!("Batch failed: {}", message);
            }
        }
    }

    let outcome = handle.join().context("Batch failed")?;
    let stopped_at_limit = outcome.state == BatchState::Cancelled && limit.is_some();
    if outcome.state != BatchState::Completed && !stopped_at_limit {
        anyhow::bail!("Batch ended in state {:?}", outcome.state);
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let tile = read_input(&input)?;
            let stats = tile.raster.statistics();

            println!("File: {}", input.display());
            println!(
                "Dimensions: {} x {} ({} cells)",
                tile.width(),
                tile.height(),
                tile.raster.len()
            );
            println!("Sample type: {}", tile.sample_type);
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / tile.raster.len().max(1) as f64
            );
        }

        // ── Single tile ──────────────────────────────────────────────
        Commands::Glcm {
            input,
            window,
            features,
            glcm,
            map_dir,
        } => {
            let tile = read_input(&input)?;
            let mut params = TextureParams {
                window,
                features: parse_features(features)?,
                ..Default::default()
            };
            glcm.apply(&mut params.quantize, &mut params.glcm, &mut params.edge_mode);

            let pb = spinner("Computing texture features...")?;
            let start = Instant::now();
            let maps = cleaned_feature_maps(&tile.raster, &params).context("Failed to compute feature maps")?;
            pb.finish_and_clear();

            if params.quantize.levels != DEFAULT_LEVELS {
                info!("Using {} gray levels", params.quantize.levels);
            }
            println!("{} ({}x{})", input.display(), window, window);
            for fm in &maps {
                let value = sentinel_mean(&fm.map, fm.feature.sentinel())
                    .with_context(|| format!("Failed to aggregate {}", fm.feature))?;
                println!("  {}: {:.6}", fm.feature, value);
            }
            println!("  Processing time: {:.2?}", start.elapsed());

            if let Some(dir) = map_dir {
                std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
                let stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "tile".into());
                for fm in &maps {
                    let path = dir.join(format!("{}_{}_{}x{}.tif", stem, fm.feature, window, window));
                    write_tiff(&fm.map, &path).context("Failed to write feature map")?;
                    println!("{} saved to: {}", fm.feature, path.display());
                }
            }
        }

        // ── Batch ────────────────────────────────────────────────────
        Commands::Batch {
            input_root,
            output_root,
            config,
            windows,
            features,
            glcm,
            limit,
        } => {
            let request = batch_request(input_root, output_root, config, windows, features, glcm)?;
            info!(
                "Batch: {} -> {}",
                request.input_root.display(),
                request.output_root.display()
            );
            run_batch(request, limit)?;
        }
    }

    Ok(())
}
