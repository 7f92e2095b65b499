use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use url_sifter::utils::logger::init_logger;
use url_sifter::{ExecutionMode, Operation, OperationRequest, ProcessOptions, ProcessorConfig, UrlProcessor};

/// Apply one operation to a newline-delimited list of URLs
#[derive(Parser, Debug)]
#[command(name = "url_sifter", version)]
struct Cli {
    /// Operation name, e.g. removeParams, deduplicateDomain, filterKeep, sortByLength
    operation: String,

    /// Match string for filterKeep and filterRemove
    #[arg(short, long = "match")]
    match_string: Option<String>,

    /// Read URLs from this file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Process every line instead of the preview prefix
    #[arg(short, long)]
    all: bool,

    /// Always run on the offload worker
    #[arg(long, conflicts_with = "in_process")]
    offload: bool,

    /// Never offload
    #[arg(long)]
    in_process: bool,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Print counters and timing to stderr as JSON
    #[arg(long)]
    stats: bool,
}

impl Cli {
    fn mode(&self) -> ExecutionMode {
        if self.offload {
            ExecutionMode::Offload
        } else if self.in_process {
            ExecutionMode::InProcess
        } else {
            ExecutionMode::Auto
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = init_logger(&cli.log_dir);

    let operation: Operation = cli.operation.parse()?;
    let config = ProcessorConfig::load(cli.config.as_deref())?;
    let urls = read_input(cli.input.as_deref())?;
    info!("Read {} lines for {}", urls.len(), operation);

    if !cli.all && urls.len() > config.preview_limit {
        eprintln!(
            "Preview mode: only the first {} non-blank lines are processed, pass --all for everything",
            config.preview_limit
        );
    }

    let mut request = OperationRequest::new(operation).process_all(cli.all);
    if let Some(match_string) = cli.match_string.clone() {
        request = request.with_match(match_string);
    }

    let options = ProcessOptions::default().with_progress(Arc::new(|event| {
        debug!(
            "Progress: {}/{} ({:.1}%), batch {}/{}",
            event.processed_count, event.total_count, event.percentage, event.batch_index, event.total_batches
        );
    }));

    let processor = UrlProcessor::new(config, cli.mode());
    let outcome = processor.process_operation(urls, &request, options).await;
    processor.shutdown().await;
    let result = outcome?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in &result.results {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;

    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&result.stats())?);
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Vec<String>> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };

    Ok(text.lines().map(str::to_owned).collect())
}
