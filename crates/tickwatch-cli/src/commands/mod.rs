mod check;
mod parse;
mod quote;
mod sources;
mod watch;

use std::sync::Arc;

use tickwatch_core::{
    AlertReport, BatchReport, BatchRunner, FetchOutcome, FileNotifier, LogNotifier,
    NotifierRegistry, ProviderId, Settings, SourceRouter, SourceRouterBuilder, SourceStrategy,
    Watchlist,
};

use crate::cli::{Cli, Command, NotifyArgs, NotifyTarget, SourceSelector};
use crate::error::CliError;
use crate::output::{CommandOutput, Table};

pub async fn run(cli: &Cli, settings: &Settings) -> Result<usize, CliError> {
    let strategy = cli
        .source
        .map(to_source_strategy)
        .unwrap_or_else(|| settings.strategy());

    match &cli.command {
        Command::Check(args) => check::run(cli, args, settings, strategy).await,
        Command::Watch(args) => watch::run(cli, args, settings, strategy).await,
        Command::Quote(args) => quote::run(cli, args, settings, strategy).await,
        Command::Parse(args) => parse::run(cli, args),
        Command::Sources(args) => sources::run(cli, args, settings, &strategy),
    }
}

fn to_source_strategy(source: SourceSelector) -> SourceStrategy {
    match source {
        SourceSelector::Auto => SourceStrategy::Auto,
        SourceSelector::Google => SourceStrategy::Strict(ProviderId::Google),
        SourceSelector::Marketwatch => SourceStrategy::Strict(ProviderId::Marketwatch),
        SourceSelector::Boursorama => SourceStrategy::Strict(ProviderId::Boursorama),
        SourceSelector::Yahoo => SourceStrategy::Strict(ProviderId::Yahoo),
    }
}

fn build_router(settings: &Settings) -> Arc<SourceRouter> {
    let mut builder = SourceRouterBuilder::new()
        .with_timeout_ms(settings.request_timeout_ms)
        .with_google_exchange(settings.google_exchange.as_str())
        .with_retry_policy(settings.retry_policy())
        .with_quotas(settings.provider_quotas);
    if !settings.sources.is_empty() {
        builder = builder.with_sources(&settings.sources);
    }
    Arc::new(builder.build())
}

fn build_runner(settings: &Settings, strategy: SourceStrategy) -> BatchRunner {
    BatchRunner::from_settings(build_router(settings), settings).with_strategy(strategy)
}

fn build_notifiers(args: &NotifyArgs) -> NotifierRegistry {
    let mut registry = NotifierRegistry::new();
    if args.notify == NotifyTarget::Log {
        registry.register(Box::new(LogNotifier));
    }
    if let Some(path) = &args.alert_file {
        registry.register(Box::new(FileNotifier::new(path)));
    }
    registry
}

/// Hand the cycle's alert (and optional summary) to the notifiers.
fn deliver(
    registry: &NotifierRegistry,
    args: &NotifyArgs,
    watchlist: &Watchlist,
    report: &BatchReport,
) -> Result<(), tickwatch_core::NotifyError> {
    let mut result = Ok(());

    match AlertReport::from_violations(&report.violations) {
        Some(alert) => result = registry.notify_all(&alert),
        None => tracing::info!("no threshold violations detected"),
    }

    if args.summary {
        if let Some(summary) = AlertReport::summary(watchlist, report) {
            let delivered = registry.notify_all(&summary);
            if result.is_ok() {
                result = delivered;
            }
        }
    }

    result
}

fn report_output(report: &BatchReport) -> Result<CommandOutput, CliError> {
    let mut table = Table::new(vec![
        "symbol", "status", "price", "currency", "source", "retries", "detail",
    ]);

    for success in &report.quotes {
        let quote = &success.quote;
        let violation = report
            .violations
            .iter()
            .find(|violation| violation.symbol == quote.symbol);
        table.push(vec![
            quote.symbol.to_string(),
            violation.map_or(String::from("ok"), |v| format!("alert:{}", v.kind)),
            quote.price.to_string(),
            quote.currency.clone(),
            quote.source.to_string(),
            success.retries().to_string(),
            violation.map_or_else(String::new, |v| v.message.clone()),
        ]);
    }
    for failure in &report.failures {
        table.push(vec![
            failure.symbol.clone(),
            failure.reason.to_string(),
            String::from("-"),
            String::from("-"),
            String::from("-"),
            failure.attempts.len().saturating_sub(1).to_string(),
            failure.summary(),
        ]);
    }

    Ok(CommandOutput::new(serde_json::to_value(report)?, table)
        .with_note(format!(
            "{} quote(s), {} violation(s), {} failure(s) in {:.1}s",
            report.quote_count(),
            report.violation_count(),
            report.failure_count(),
            report.duration().as_secs_f64()
        ))
        .with_failures(report.failure_count()))
}

fn outcomes_output(outcomes: &[FetchOutcome]) -> Result<CommandOutput, CliError> {
    let mut table = Table::new(vec!["symbol", "price", "currency", "source", "retries", "detail"]);
    let mut failures = 0;

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Success(success) => table.push(vec![
                success.quote.symbol.to_string(),
                success.quote.price.to_string(),
                success.quote.currency.clone(),
                success.quote.source.to_string(),
                success.retries().to_string(),
                success.warnings.join("; "),
            ]),
            FetchOutcome::Failure(failure) => {
                failures += 1;
                table.push(vec![
                    failure.symbol.clone(),
                    String::from("-"),
                    String::from("-"),
                    String::from("-"),
                    failure.attempts.len().saturating_sub(1).to_string(),
                    failure.summary(),
                ]);
            }
        }
    }

    Ok(CommandOutput::new(serde_json::to_value(outcomes)?, table).with_failures(failures))
}
