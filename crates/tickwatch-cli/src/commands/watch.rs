use std::time::Duration;

use tickwatch_core::config::{check_range, MAX_CHECK_INTERVAL_MINUTES};
use tickwatch_core::{Settings, SourceStrategy, Watchlist};
use tokio::time::MissedTickBehavior;

use crate::cli::{Cli, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{build_notifiers, build_runner, deliver, report_output};

/// Run a cycle immediately, then one per interval until Ctrl-C or the
/// requested cycle count. A failed cycle or alert delivery is logged and the
/// next cycle runs as scheduled. Returns the failure count of the last cycle.
pub async fn run(
    cli: &Cli,
    args: &WatchArgs,
    settings: &Settings,
    strategy: SourceStrategy,
) -> Result<usize, CliError> {
    let period = match args.interval_minutes {
        Some(minutes) => {
            check_range("check_interval_minutes", minutes, MAX_CHECK_INTERVAL_MINUTES)?;
            Duration::from_secs(minutes * 60)
        }
        None => settings.check_interval(),
    };

    let watchlist = Watchlist::load(&settings.watchlist)?;
    let runner = build_runner(settings, strategy);
    let notifiers = build_notifiers(&args.notify);

    tracing::info!(
        interval_secs = period.as_secs(),
        symbols = watchlist.entries.len(),
        "watching; press Ctrl-C to stop"
    );

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycles = 0u32;
    let mut last_failures = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }

        cycles += 1;
        tracing::info!(cycle = cycles, "starting check cycle");
        let report = runner.run(&watchlist).await;

        let rendered = report_output(&report)?;
        output::render(&rendered, cli.format, cli.pretty)?;
        last_failures = rendered.failure_count;

        if let Err(error) = deliver(&notifiers, &args.notify, &watchlist, &report) {
            tracing::error!(error = %error, "alert delivery failed; will retry next cycle");
        }

        if args.cycles.is_some_and(|limit| cycles >= limit) {
            break;
        }
    }

    Ok(last_failures)
}
