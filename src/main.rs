use anyhow::{Context, Result};
use clap::Parser;

use hnstories::config::DEFAULT_TOTAL;
use hnstories::{fetch_all, FanoutOptions, HnClient, HnConfig};

/// Fetch the newest Hacker News stories concurrently and print them in order.
#[derive(Parser, Debug)]
#[command(name = "hnstories")]
#[command(about = "Fetch the newest Hacker News stories concurrently", long_about = None)]
struct Cli {
    /// Number of newest stories to fetch
    #[arg(long, default_value_t = DEFAULT_TOTAL)]
    total: usize,

    /// Maximum concurrent fetches (default: one per story, or HNSTORIES_MAX_PARALLEL)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_parallel: Option<u64>,

    /// Stop launching new fetches once one has failed
    #[arg(long)]
    cancel_on_failure: bool,

    /// API base URL (default: HNSTORIES_BASE_URL or the public API)
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout in seconds (default: HNSTORIES_TIMEOUT_SECS or 30)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Print stories as a JSON array
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn print_error_chain(err: &anyhow::Error) {
    eprintln!("Error: {err}");

    let mut n = 0;
    let mut cur = err.source();
    while let Some(cause) = cur {
        eprintln!("  {n}: {cause}");
        n += 1;
        cur = cause.source();
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = real_main(cli) {
        print_error_chain(&err);
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let hn_cfg = HnConfig::from_env_or(cli.base_url, cli.timeout_secs)?;
    let mut opts = FanoutOptions::from_env_or(cli.max_parallel.map(|v| v as usize))?;
    opts.cancel_on_failure = cli.cancel_on_failure;
    opts.limit = Some(cli.total);

    let client = HnClient::new(&hn_cfg)?;
    let stories = fetch_all(&client, &client, &opts)
        .with_context(|| format!("failed to fetch stories from {}", client.base_url()))?;

    if cli.json {
        let out = serde_json::to_string_pretty(&stories).context("serialize stories json")?;
        println!("{out}");
    } else {
        for story in &stories {
            println!("{story}");
        }
    }

    tracing::debug!(stories = stories.len(), "done");
    Ok(())
}
