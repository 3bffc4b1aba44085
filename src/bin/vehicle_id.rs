//! CLI binary for edgequake-vehicle-id.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IdentifyConfig`, then either serves the HTTP endpoint or runs one
//! identification and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_vehicle_id::{
    api, ClassifierMode, IdentifyConfig, IdentifyProgressCallback, IdentifyReport, Identifier,
    ProgressCallback, Stage, StageError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that follows the pipeline's stage transitions.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Identifying");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl IdentifyProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        match stage {
            Stage::Received => self.bar.set_message("request received"),
            Stage::Acquiring => self.bar.set_message("downloading image…"),
            Stage::Recognizing | Stage::Classifying => {
                self.bar.set_message("reading plate and vehicle…")
            }
            Stage::Validating => self.bar.set_message("validating plate…"),
            Stage::Completed | Stage::Failed => self.bar.finish_and_clear(),
        }
    }

    fn on_degraded(&self, error: &StageError) {
        self.bar
            .println(format!("  {} {}", yellow("⚠"), dim(&error.to_string())));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Identify one photo
  vehicle-id identify https://example.com/car.jpg

  # Structured output with timings
  vehicle-id identify --json https://example.com/car.jpg

  # Serve POST /detect_vehicle on port 8080, classifier enabled
  vehicle-id serve --addr 0.0.0.0:8080 --classifier vision

  # Another plate format (anchored automatically)
  vehicle-id identify --plate-pattern '[0-9]{4}[A-Z]{3}' https://example.com/car.jpg

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  VEHICLE_ID_*            Every flag below (see --help for each name)
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Identify vehicles (plate, brand, type) from photographs.
#[derive(Parser, Debug)]
#[command(
    name = "vehicle-id",
    version,
    about = "Identify vehicles (license plate, brand, type) from photographs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "VEHICLE_ID_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "VEHICLE_ID_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the identification endpoint over HTTP.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "VEHICLE_ID_ADDR", default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
    },
    /// Identify the vehicle in one image URL.
    Identify {
        /// HTTP/HTTPS URL of the photograph.
        url: String,

        /// Output the full report (result, timings, degradations) as JSON.
        #[arg(long, env = "VEHICLE_ID_JSON")]
        json: bool,

        /// Disable the progress spinner.
        #[arg(long, env = "VEHICLE_ID_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Vision model ID for OCR (e.g. gpt-4.1-nano, gpt-4.1, llava).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Provider for OCR: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Brand/type classification: disabled or vision.
    #[arg(long, global = true, env = "VEHICLE_ID_CLASSIFIER", value_enum, default_value = "disabled")]
    classifier: ClassifierArg,

    /// Provider for the classifier. Defaults to the OCR provider.
    #[arg(long, global = true, env = "VEHICLE_ID_CLASSIFIER_PROVIDER")]
    classifier_provider: Option<String>,

    /// Model for the classifier. Defaults to the OCR model.
    #[arg(long, global = true, env = "VEHICLE_ID_CLASSIFIER_MODEL")]
    classifier_model: Option<String>,

    /// File with one allowed "<Brand> <type>" label per line.
    #[arg(long, global = true, env = "VEHICLE_ID_CLASSIFIER_LABELS")]
    classifier_labels: Option<PathBuf>,

    /// OCR languages, comma-separated ISO 639-1 codes.
    #[arg(long, global = true, env = "VEHICLE_ID_LANGUAGES", value_delimiter = ',', default_value = "es")]
    languages: Vec<String>,

    /// Minimum OCR confidence; a plate must score strictly above it.
    #[arg(long, global = true, env = "VEHICLE_ID_THRESHOLD", default_value_t = 0.5)]
    threshold: f32,

    /// Plate grammar as a regular expression over normalised text.
    #[arg(long, global = true, env = "VEHICLE_ID_PLATE_PATTERN")]
    plate_pattern: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "VEHICLE_ID_DOWNLOAD_TIMEOUT", default_value_t = 10)]
    download_timeout: u64,

    /// Largest accepted image, in bytes.
    #[arg(long, global = true, env = "VEHICLE_ID_MAX_IMAGE_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_image_bytes: usize,

    /// Max reply tokens per model call.
    #[arg(long, global = true, env = "VEHICLE_ID_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, global = true, env = "VEHICLE_ID_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ClassifierArg {
    Disabled,
    Vision,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback a one-shot run needs, so library
    // INFO logs are suppressed while it is shown.
    let show_progress = match cli.command {
        Command::Identify {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn IdentifyProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli.pipeline, progress_cb).await?;
    let identifier = Identifier::new(&config).context("Failed to initialise pipeline")?;

    match cli.command {
        Command::Serve { addr } => {
            info!(
                "Classifier {}",
                if identifier.classifier_enabled() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down");
            };
            api::serve(addr, identifier, shutdown)
                .await
                .with_context(|| format!("Server on {addr} failed"))?;
        }
        Command::Identify { url, json, .. } => {
            let report = identifier
                .run(&url)
                .await
                .context("Identification failed")?;

            if json {
                let out =
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
                println!("{out}");
            } else {
                print_report(&report, cli.quiet);
            }
        }
    }

    Ok(())
}

fn print_report(report: &IdentifyReport, quiet: bool) {
    let r = &report.result;
    let plate = if r.plate.found {
        green(&r.plate.text)
    } else {
        yellow(&r.plate.text)
    };
    println!("{}  {}", bold("Plate:"), plate);
    println!("{}  {}", bold("Brand:"), r.vehicle.brand);
    println!("{}   {}", bold("Type:"), r.vehicle.kind);

    if !quiet {
        let s = &report.stats;
        eprintln!(
            "{}",
            dim(&format!(
                "{}x{} image  {} text region(s)  fetch {}ms  ocr {}ms  classify {}ms  total {}ms",
                s.image_width,
                s.image_height,
                s.candidates,
                s.fetch_ms,
                s.recognize_ms,
                s.classify_ms,
                s.total_ms
            ))
        );
    }
}

/// Map CLI args to `IdentifyConfig`.
async fn build_config(
    args: &PipelineArgs,
    progress: Option<ProgressCallback>,
) -> Result<IdentifyConfig> {
    let labels = if let Some(ref path) = args.classifier_labels {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read classifier labels from {:?}", path))?;
        parse_labels(&text)
    } else {
        Vec::new()
    };

    let classifier = match args.classifier {
        ClassifierArg::Disabled => ClassifierMode::Disabled,
        ClassifierArg::Vision => ClassifierMode::Vision {
            provider_name: args.classifier_provider.clone(),
            model: args.classifier_model.clone(),
        },
    };

    let mut builder = IdentifyConfig::builder()
        .confidence_threshold(args.threshold)
        .ocr_languages(args.languages.iter().map(|l| l.trim().to_string()))
        .download_timeout_secs(args.download_timeout)
        .max_image_bytes(args.max_image_bytes)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .classifier(classifier)
        .classifier_labels(labels);

    if let Some(ref pattern) = args.plate_pattern {
        builder = builder.plate_pattern(pattern.clone());
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// One label per line; blank lines and `#` comments are skipped.
fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
