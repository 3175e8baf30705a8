use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sizefit::imaging::Dpi;
use sizefit::process::{Mode, ProcessConfig, ProcessEvent};
use sizefit::search::SizeTarget;
use sizefit::{config, output, process, scan, size_spec};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Inputs, target and output flags shared by `size` and `dpi`.
#[derive(clap::Args, Clone)]
struct BatchArgs {
    /// Image files or directories (jpg, jpeg, png, webp, tif, tiff)
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Target file size, e.g. 500KB, 1.5MB, 2m, 200000
    target: String,

    /// Write outputs into this directory instead of next to each input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Appended to every output file stem (overrides config)
    #[arg(long)]
    suffix: Option<String>,

    /// Replace existing files instead of picking a free `_N` name
    #[arg(long)]
    overwrite: bool,

    /// Descend into subdirectories of directory inputs
    #[arg(short, long)]
    recursive: bool,

    /// Allowed deviation from the target as a fraction, e.g. 0.05 (overrides config)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Write a JSON report of every file to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args, Clone)]
struct DpiArgs {
    #[command(flatten)]
    batch: BatchArgs,

    /// Set this DPI on every file without searching
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=65535))]
    dpi: Option<u32>,
}

fn version_string() -> &'static str {
    if env!("ON_RELEASE_TAG") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("GIT_HASH") {
        "" => "dev@unknown",
        // Leaked once at startup
        hash => Box::leak(format!("dev@{hash}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "sizefit")]
#[command(about = "Fit image files to a target byte size")]
#[command(long_about = "\
Fit image files to a target byte size

sizefit binary-searches an encoder setting until each output file lands
within a tolerance band (default 5%) around the target. Trial encodes stay
in memory; only the chosen result is written.

Modes:

  sizefit size photo.jpg 500KB          quality search (JPEG, WebP)
  sizefit dpi scan.tiff 2MB             DPI search, then quality if needed
  sizefit dpi photos/ 1MB --dpi 300     set DPI only, no search

Sizes use base 1024: 500KB = 512000 bytes, 1.5MB = 1572864 bytes.

Outputs keep the input format. Without --output they are written next to
the input; an existing file is never replaced unless --overwrite is given
(photo.jpg → photo_1.jpg).

Run 'sizefit gen-config' to generate a documented sizefit.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./sizefit.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print one line per file instead of a progress bar
    #[arg(long, global = true)]
    no_progress: bool,

    /// Log every trial encode
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search encoder quality to hit the target size
    Size(BatchArgs),
    /// Search DPI to hit the target size, or set a fixed DPI with --dpi
    Dpi(DpiArgs),
    /// Print a stock sizefit.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ok = match &cli.command {
        Command::Size(batch) => run_batch(&cli, Mode::Size, batch)?,
        Command::Dpi(args) => {
            let mode = match args.dpi {
                Some(dpi) => Mode::FixedDpi(Dpi::uniform(dpi)),
                None => Mode::AutoDpi,
            };
            run_batch(&cli, mode, &args.batch)?
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// `RUST_LOG` wins unless `-v` asks for trial-level logs.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sizefit=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sizefit=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run one batch. Returns `false` when any file failed.
fn run_batch(cli: &Cli, mode: Mode, args: &BatchArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let mut tool = config::load_config(cli.config.as_deref(), Path::new("."))?;
    if let Some(tolerance) = args.tolerance {
        tool.search.tolerance = tolerance;
    }
    if let Some(suffix) = &args.suffix {
        tool.output.suffix = suffix.clone();
    }
    if args.overwrite {
        tool.output.auto_increment = false;
    }
    tool.validate()?;

    let bytes = size_spec::parse_size(&args.target)?;
    let target = SizeTarget::new(bytes, tool.search.tolerance)?;
    let inputs = scan::resolve_inputs(&args.inputs, args.recursive)?;

    let mut process_config = ProcessConfig::from_tool_config(&tool, mode, target);
    process_config.output_dir = args.output.clone();

    let bar = if cli.no_progress {
        ProgressBar::hidden()
    } else {
        progress_bar(inputs.len() as u64)?
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let printer_bar = bar.clone();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if let ProcessEvent::FileStarted { input, .. } = &event {
                printer_bar.set_message(input.display().to_string());
            }
            for line in output::format_process_event(&event) {
                if printer_bar.is_hidden() {
                    println!("{}", line);
                } else {
                    printer_bar.println(line);
                }
            }
            if let ProcessEvent::FileFinished { .. } = event {
                printer_bar.inc(1);
            }
        }
        printer_bar.finish_and_clear();
    });

    let summary = process::process(&inputs, &process_config, Some(tx))?;
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    println!();
    output::print_summary(&summary);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)?;
    }

    Ok(!summary.has_failures())
}

fn progress_bar(len: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}
