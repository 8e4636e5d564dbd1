use tickwatch_core::{Settings, SourceStrategy, Watchlist};

use crate::cli::{CheckArgs, Cli};
use crate::error::CliError;
use crate::output;

use super::{build_notifiers, build_runner, deliver, report_output};

/// One cycle: fetch, evaluate, render, notify. Returns the failure count.
pub async fn run(
    cli: &Cli,
    args: &CheckArgs,
    settings: &Settings,
    strategy: SourceStrategy,
) -> Result<usize, CliError> {
    let watchlist = Watchlist::load(&settings.watchlist)?;
    let runner = build_runner(settings, strategy);
    let notifiers = build_notifiers(&args.notify);

    tracing::info!(symbols = watchlist.entries.len(), strategy = %runner.strategy(), "starting check cycle");
    let report = runner.run(&watchlist).await;

    let rendered = report_output(&report)?;
    output::render(&rendered, cli.format, cli.pretty)?;

    deliver(&notifiers, &args.notify, &watchlist, &report)?;
    Ok(rendered.failure_count)
}
