use anyhow::Context;
use clap::{Parser, Subcommand};
use face_averaging::analysis::RunSummary;
use face_averaging::config::{load_config, Config, ConfigFormat};
use face_averaging::data::{load_photo, DirectorySink, DirectorySource, SyntheticBatch};
use face_averaging::logging::{global_metrics, init_logging, new_correlation_id, LoggingConfig};
use face_averaging::pipeline::{FacePipeline, MemorySink, OutputSink};
use face_averaging::visualization::print_run_summary;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "faces")]
#[command(about = "Align annotated face photos and blend them into an average face")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Align every annotated photo in a directory and write the average face
    Align {
        /// Directory of photos, each with a matching .txt landmark file
        input: PathBuf,

        /// Directory for the aligned photos and the average
        output: PathBuf,

        /// Output canvas width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Output canvas height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only write the average, not the individual aligned photos
        #[arg(long)]
        no_aligned: bool,
    },

    /// Perturb one annotated photo at random and check the pipeline undoes it
    Validate {
        /// Photo with a matching .txt landmark file
        image: PathBuf,

        /// Number of perturbed copies
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Directory for the aligned copies, average and report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,

        /// File format: toml or json
        #[arg(short, long, default_value = "toml")]
        format: ConfigFormat,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    match cli.command {
        Commands::Align {
            input,
            output,
            width,
            height,
            config,
            no_aligned,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(width) = width {
                config.canvas.width = width;
            }
            if let Some(height) = height {
                config.canvas.height = height;
            }
            if no_aligned {
                config.output.write_aligned = false;
            }
            let _guard = init_logging(&logging_for(&config, cli.verbose, level))?;
            handle_align(&config, &input, &output)?;
        }
        Commands::Validate {
            image,
            count,
            seed,
            output,
            config,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(count) = count {
                config.validation.photo_count = count;
            }
            if let Some(seed) = seed {
                config.validation.seed = seed;
            }
            let _guard = init_logging(&logging_for(&config, cli.verbose, level))?;
            handle_validate(&config, &image, output.as_deref())?;
        }
        Commands::InitConfig { path, format } => {
            Config::default()
                .save_to_file(&path, format)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}

/// The config file's logging section, with `-v` raising the global level.
fn logging_for(config: &Config, verbose: u8, level: &str) -> LoggingConfig {
    if verbose > 0 {
        config.logging.clone().with_level(level)
    } else {
        config.logging.clone()
    }
}

fn log_stage_stats() {
    for stage in ["pass1", "pass2", "pass3", "composite"] {
        if let Some(stats) = global_metrics().calculate_stats(stage) {
            debug!(
                stage = stage,
                runs = stats.count,
                mean_ms = stats.mean_ms,
                p95_ms = stats.p95_ms,
                "Stage timing statistics"
            );
        }
    }
}

/// Write this run's stage measurements from the global collector.
fn save_run_metrics(config: &Config, dir: &Path, correlation_id: Uuid) -> anyhow::Result<()> {
    let Some(name) = &config.output.metrics_file_name else {
        return Ok(());
    };

    let path = dir.join(name);
    let json = global_metrics().export_run_json(correlation_id)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!(path = %path.display(), "Run metrics saved");
    Ok(())
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|errors| anyhow::anyhow!("Invalid configuration: {}", errors.join("; ")))
}

fn handle_align(config: &Config, input: &Path, output: &Path) -> anyhow::Result<()> {
    check_config(config)?;
    new_correlation_id();

    let pipeline = FacePipeline::builder("align")
        .canvas(config.canvas)
        .write_aligned(config.output.write_aligned)
        .build();
    let source = DirectorySource::new(input);
    let mut sink = DirectorySink::with_output_config(output, &config.output)?;

    let run = pipeline.run_with(&source, &mut sink)?;
    log_stage_stats();
    let summary = RunSummary::from_run(&run);
    print_run_summary(&summary);

    if let Some(name) = &config.output.report_file_name {
        let path = output.join(name);
        summary.save(&path)?;
        info!(path = %path.display(), "Run report saved");
    }
    save_run_metrics(config, output, run.correlation_id)?;

    println!(
        "Wrote {} file(s) to {}",
        sink.written().len(),
        output.display()
    );
    Ok(())
}

fn handle_validate(config: &Config, image: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    check_config(config)?;
    new_correlation_id();

    let base = load_photo(image)?;
    let batch = SyntheticBatch::generate(&base, &config.validation)
        .context("Failed to generate synthetic batch")?;
    info!(
        base = %batch.base_label,
        copies = batch.len(),
        seed = batch.seed,
        "Generated synthetic batch"
    );

    let pipeline = FacePipeline::builder("validate")
        .canvas(config.canvas)
        .write_aligned(config.output.write_aligned)
        .build();
    let records = batch.records();

    let mut memory = MemorySink::new();
    let mut directory;
    let sink: &mut dyn OutputSink = match output {
        Some(dir) => {
            directory = DirectorySink::with_output_config(dir, &config.output)?;
            &mut directory
        }
        None => &mut memory,
    };

    let run = pipeline.run_with(&records, sink)?;
    log_stage_stats();
    let summary = RunSummary::from_run(&run);
    print_run_summary(&summary);

    if let Some(dir) = output {
        if let Some(name) = &config.output.report_file_name {
            summary.save(dir.join(name))?;
        }
        save_run_metrics(config, dir, run.correlation_id)?;
    }

    let bound = config.validation.max_mean_residual_px;
    if summary.mean_residual_px > bound {
        anyhow::bail!(
            "Validation failed: mean residual {:.3}px exceeds {:.3}px",
            summary.mean_residual_px,
            bound
        );
    }

    println!(
        "Validation passed: mean residual {:.3}px (bound {:.3}px)",
        summary.mean_residual_px, bound
    );
    Ok(())
}
