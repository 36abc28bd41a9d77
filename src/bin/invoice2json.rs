//! CLI binary for invoice2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, prints progress to stderr, and writes the final
//! result JSON to stdout or a file.

use anyhow::{Context, Result};
use clap::Parser;
use invoice2json::{
    process_document, Currency, ExtractionConfig, NoticeLevel, ProgressSink,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Extract structured invoice JSON from a scan or a multi-page PDF.
#[derive(Parser, Debug)]
#[command(name = "invoice2json", version, about)]
struct Cli {
    /// Input file: a PDF (multi-page pipeline) or an image (single-image).
    input: PathBuf,

    /// Vision model identifier.
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible chat-completions API.
    #[arg(long, env = "OPENAI_BASE_URL")]
    api_base: Option<String>,

    /// Write the final result JSON here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory receiving individual and master result artifacts.
    #[arg(long, default_value = "resultjson")]
    results_dir: PathBuf,

    /// Skip writing result artifacts.
    #[arg(long)]
    no_save: bool,

    /// Currency assumed when the document carries no signal (inr/usd/eur/gbp).
    #[arg(long, default_value = "inr", value_parser = parse_currency)]
    default_currency: Currency,

    /// Suppress progress notices on stderr.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_currency(s: &str) -> Result<Currency, String> {
    match s.to_ascii_lowercase().as_str() {
        "inr" => Ok(Currency::Inr),
        "usd" => Ok(Currency::Usd),
        "eur" => Ok(Currency::Eur),
        "gbp" => Ok(Currency::Gbp),
        other => Err(format!("unknown currency '{other}' (expected inr/usd/eur/gbp)")),
    }
}

// ── Terminal progress sink ───────────────────────────────────────────────────

/// Prints each notice to stderr with a severity colour. The final payload is
/// ignored here — main prints the returned result itself.
struct TermSink {
    quiet: bool,
}

impl ProgressSink for TermSink {
    fn notice(&self, level: NoticeLevel, message: &str) {
        if self.quiet {
            return;
        }
        let line = match level {
            NoticeLevel::Info => dim(message),
            NoticeLevel::Success => green(message),
            NoticeLevel::Warning => yellow(message),
            NoticeLevel::Error => red(message),
        };
        eprintln!("{line}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let file_name = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("not a file path: {}", cli.input.display()))?;
    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let mut builder = ExtractionConfig::builder()
        .results_dir(&cli.results_dir)
        .default_currency(cli.default_currency)
        .persist(!cli.no_save);
    if let Some(model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(api_base) = cli.api_base {
        builder = builder.api_base(api_base);
    }
    let config = builder.build()?;

    let sink = TermSink { quiet: cli.quiet };
    let outcome = process_document(&file_name, &bytes, &config, &sink).await?;

    let Some(stored) = outcome else {
        anyhow::bail!("document rejected: not a readable invoice");
    };

    let json = serde_json::to_string_pretty(&stored)?;
    match cli.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{}", green(&format!("Result written to {}", path.display())));
            }
        }
        None => println!("{json}"),
    }

    Ok(())
}
