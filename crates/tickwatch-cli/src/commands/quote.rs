use tickwatch_core::{Settings, SourceStrategy, Symbol};

use crate::cli::{Cli, QuoteArgs};
use crate::error::CliError;
use crate::output;

use super::{build_runner, outcomes_output};

pub async fn run(
    cli: &Cli,
    args: &QuoteArgs,
    settings: &Settings,
    strategy: SourceStrategy,
) -> Result<usize, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|value| Symbol::parse(value))
        .collect::<Result<Vec<_>, _>>()?;

    let outcomes = build_runner(settings, strategy).fetch_all(symbols).await;

    let rendered = outcomes_output(&outcomes)?;
    output::render(&rendered, cli.format, cli.pretty)?;
    Ok(rendered.failure_count)
}
