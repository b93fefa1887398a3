//! CLI binary for plant-report.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `analyze` and `report` run the same pipeline on local files.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use plant_report::server::{self, AppState, DEFAULT_PORT};
use plant_report::{
    analyze_upload, generate_report_to_file, ingest_bytes, report_filename, EncodedImage,
    FooterStyle, LlmAnalyzer, ServiceConfig,
};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the web service on port 5001 (or $PORT)
  plant-report serve

  # Analyse a photo and print the result
  plant-report analyze leaf.jpg

  # Analyse a photo and write the PDF report in one go
  plant-report analyze leaf.jpg -o report.pdf

  # Render a report from a saved analysis
  plant-report report --result analysis.txt --image leaf.jpg -o report.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PORT                    Listening port for `serve`
  RUST_LOG                Log filter, overrides --verbose/--quiet

A .env file in the working directory is loaded on startup.
"#;

/// Analyse plant photos with a Vision LLM and render PDF reports.
#[derive(Parser, Debug)]
#[command(
    name = "plant-report",
    version,
    about = "Analyse plant photos with a Vision LLM and render PDF reports",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Vision model ID (default: gemini-1.5-flash).
    #[arg(long, global = true, env = "PLANT_REPORT_MODEL")]
    model: Option<String>,

    /// LLM provider (gemini, openai, anthropic, ollama, …).
    #[arg(long, global = true, env = "PLANT_REPORT_PROVIDER")]
    provider: Option<String>,

    /// Sampling temperature.
    #[arg(long, global = true, env = "PLANT_REPORT_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Maximum output tokens for the analysis.
    #[arg(long, global = true, env = "PLANT_REPORT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Timeout for the vision call, in seconds.
    #[arg(long, global = true, env = "PLANT_REPORT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Largest accepted image upload, in bytes.
    #[arg(long, global = true, env = "PLANT_REPORT_MAX_UPLOAD", default_value_t = 20 * 1024 * 1024)]
    max_upload_bytes: u64,

    /// Directory for staged uploads (default: system temp dir).
    #[arg(long, global = true, env = "PLANT_REPORT_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Footer wording.
    #[arg(long, global = true, value_enum, default_value = "page")]
    footer: FooterArg,

    /// Debug logging.
    #[arg(short, long, global = true, env = "PLANT_REPORT_VERBOSE")]
    verbose: bool,

    /// Errors only; no spinner.
    #[arg(short, long, global = true, env = "PLANT_REPORT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Interface to bind.
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Analyse a plant photo and print the result.
    Analyze {
        /// Image file (jpeg, png, webp, …).
        image: PathBuf,

        /// Print `{"result", "image"}` JSON instead of plain text.
        #[arg(long)]
        json: bool,

        /// Also render the PDF report to this path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a PDF report from analysis text.
    Report {
        /// File holding the analysis text, or `-` for stdin.
        #[arg(long)]
        result: PathBuf,

        /// Image to include on the second page.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Output path (default: plant_analysis_report_<ms>.pdf).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum FooterArg {
    /// "Page 3"
    Page,
    /// "Page 3 of 5"
    PageOfTotal,
}

impl From<FooterArg> for FooterStyle {
    fn from(v: FooterArg) -> Self {
        match v {
            FooterArg::Page => FooterStyle::PageNumber,
            FooterArg::PageOfTotal => FooterStyle::PageOfTotal,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.opts.verbose {
        "debug"
    } else if cli.opts.quiet {
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

    let config = build_config(&cli.opts)?;

    match cli.command {
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("Invalid listen address {host}:{port}"))?;
            let state =
                AppState::from_config(config).context("Failed to configure vision provider")?;
            server::serve(state, addr).await.context("Server failed")?;
        }
        Command::Analyze {
            image,
            json,
            output,
        } => {
            let analyzer =
                LlmAnalyzer::from_config(&config).context("Failed to configure vision provider")?;
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let upload = ingest_bytes(bytes, &mime_for(&image), &config.upload_limits())
                .await
                .context("Image rejected")?;

            let spinner = spinner(&cli.opts, "Analysing image…");
            let result = analyze_upload(upload, &analyzer).await;
            spinner.finish_and_clear();
            let result = result.context("Analysis failed")?;

            {
                let mut handle = io::stdout().lock();
                if json {
                    let text = serde_json::to_string_pretty(&result)
                        .context("Failed to serialise result")?;
                    writeln!(handle, "{text}").context("Failed to write to stdout")?;
                } else {
                    writeln!(handle, "{}", result.text).context("Failed to write to stdout")?;
                }
            }

            if let Some(path) = output {
                write_report(&cli.opts, &config, &result.text, Some(&result.image_data_uri), &path)
                    .await?;
            }
        }
        Command::Report {
            result,
            image,
            output,
        } => {
            let text = read_result(&result).await?;
            let image_uri = match image {
                Some(ref path) => Some(data_uri_for(path).await?),
                None => None,
            };
            let path = output.unwrap_or_else(|| PathBuf::from(report_filename(chrono::Utc::now())));
            write_report(&cli.opts, &config, &text, image_uri.as_deref(), &path).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(opts: &GlobalOpts) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .temperature(opts.temperature)
        .max_tokens(opts.max_tokens)
        .api_timeout_secs(opts.api_timeout)
        .max_upload_bytes(opts.max_upload_bytes)
        .footer(opts.footer.clone().into());

    if let Some(ref model) = opts.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = opts.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref dir) = opts.upload_dir {
        builder = builder.upload_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

async fn write_report(
    opts: &GlobalOpts,
    config: &ServiceConfig,
    text: &str,
    image_uri: Option<&str>,
    path: &Path,
) -> Result<()> {
    let spinner = spinner(opts, "Rendering report…");
    let report = generate_report_to_file(text, image_uri, &config.report, path).await;
    spinner.finish_and_clear();
    let report = report.context("Report generation failed")?;

    if report.image_omitted() {
        eprintln!("warning: the image could not be embedded and was left out");
    }
    if !opts.quiet {
        eprintln!(
            "{} {}  {}",
            green("✓"),
            path.display(),
            dim(&format!("{} bytes", report.bytes.len()))
        );
    }
    Ok(())
}

async fn read_result(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read analysis from stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read analysis from {}", path.display()))
}

async fn data_uri_for(path: &Path) -> Result<String> {
    let mime_type = mime_for(path);
    if !mime_type.starts_with("image/") {
        bail!("{} is not a recognised image file", path.display());
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(EncodedImage {
        data: STANDARD.encode(&bytes),
        mime_type,
    }
    .to_data_uri())
}

/// Media type from the file extension.
fn mime_for(path: &Path) -> String {
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

fn spinner(opts: &GlobalOpts, message: &'static str) -> ProgressBar {
    if opts.quiet || opts.verbose {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
