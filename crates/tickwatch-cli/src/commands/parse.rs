use serde::Serialize;
use tickwatch_core::{parse_price_detailed, NumberFormat};

use crate::cli::{Cli, ParseArgs};
use crate::error::CliError;
use crate::output::{self, CommandOutput, Table};

#[derive(Debug, Serialize)]
struct ParsedPriceData<'a> {
    input: &'a str,
    value: String,
    format: NumberFormat,
    currency: Option<&'static str>,
}

pub fn run(cli: &Cli, args: &ParseArgs) -> Result<usize, CliError> {
    let parsed = parse_price_detailed(&args.text)?;

    let data = ParsedPriceData {
        input: &args.text,
        value: parsed.value.to_string(),
        format: parsed.format,
        currency: parsed.currency,
    };

    let mut table = Table::new(vec!["input", "value", "format", "currency"]);
    table.push(vec![
        args.text.clone(),
        data.value.clone(),
        data.format.to_string(),
        data.currency.unwrap_or("-").to_owned(),
    ]);

    output::render(
        &CommandOutput::new(serde_json::to_value(&data)?, table),
        cli.format,
        cli.pretty,
    )?;
    Ok(0)
}
