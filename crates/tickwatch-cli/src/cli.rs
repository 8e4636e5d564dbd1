//! CLI argument definitions for tickwatch.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `check` | Run one check cycle over the watchlist |
//! | `watch` | Run a cycle now, then every check interval until Ctrl-C |
//! | `quote` | Fetch quotes for symbols, no thresholds |
//! | `parse` | Run the price parser on a string |
//! | `sources` | List providers and their routing metadata |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--settings` | none | JSON settings file |
//! | `--watchlist` | `config/stocks.json` | Watchlist file |
//! | `--format` | `table` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Exit 5 when any symbol failed |
//! | `--source` | settings | Source selection strategy |
//!
//! # Examples
//!
//! ```bash
//! tickwatch check --watchlist config/stocks.json
//! tickwatch watch --alert-file data/alerts.txt
//! tickwatch quote AAPL FR0000121014 --format json --pretty
//! tickwatch parse "1.234,56 €"
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Price threshold watcher over public quote pages.
#[derive(Debug, Parser)]
#[command(
    name = "tickwatch",
    author,
    version,
    about = "Watch stock prices across several public sources and report threshold crossings"
)]
pub struct Cli {
    /// JSON settings file. Environment variables override it.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Watchlist file (`{"stocks": [...]}`).
    #[arg(long, global = true)]
    pub watchlist: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Exit with code 5 when any symbol could not be fetched.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Source selection: `auto` or a single provider with no fallback.
    #[arg(long, global = true, value_enum)]
    pub source: Option<SourceSelector>,

    /// Symbols fetched in parallel (1 = sequential).
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Log filter, e.g. `debug` or `tickwatch_core=trace`. `RUST_LOG` wins.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSelector {
    Auto,
    Google,
    Marketwatch,
    Boursorama,
    Yahoo,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one check cycle and notify any threshold crossings.
    Check(CheckArgs),
    /// Run a check cycle now, then every check interval until Ctrl-C.
    Watch(WatchArgs),
    /// Fetch current quotes without evaluating thresholds.
    Quote(QuoteArgs),
    /// Parse a price string and show how it was read.
    Parse(ParseArgs),
    /// List price sources, routing order and quotas.
    Sources(SourcesArgs),
}

#[derive(Debug, Clone, Args)]
pub struct NotifyArgs {
    /// Where alerts go.
    #[arg(long, value_enum, default_value_t = NotifyTarget::Log)]
    pub notify: NotifyTarget,

    /// Also append alerts to this file.
    #[arg(long)]
    pub alert_file: Option<PathBuf>,

    /// Also send a summary of every tracked symbol.
    #[arg(long, default_value_t = false)]
    pub summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifyTarget {
    Log,
    None,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub notify: NotifyArgs,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub notify: NotifyArgs,

    /// Override the check interval.
    #[arg(long)]
    pub interval_minutes: Option<u64>,

    /// Stop after this many cycles.
    #[arg(long)]
    pub cycles: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    /// Tickers or ISINs.
    #[arg(required = true)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ParseArgs {
    /// Raw price text, e.g. "1.234,56 €".
    pub text: String,
}

#[derive(Debug, Clone, Args)]
pub struct SourcesArgs {
    /// Show the planned source order for this symbol.
    #[arg(long)]
    pub plan: Option<String>,
}
