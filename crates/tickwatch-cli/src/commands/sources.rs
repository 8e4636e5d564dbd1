use serde::Serialize;
use tickwatch_core::{ProviderId, ProviderPolicy, Settings, SourceStrategy, Symbol};

use crate::cli::{Cli, SourcesArgs};
use crate::error::CliError;
use crate::output::{self, CommandOutput, Table};

use super::build_router;

#[derive(Debug, Serialize)]
struct SourceStatus {
    id: ProviderId,
    enabled: bool,
    home_region: Option<&'static str>,
    default_rank: Option<usize>,
    quota: Option<ProviderPolicy>,
}

#[derive(Debug, Serialize)]
struct SourcesData {
    strategy: String,
    sources: Vec<SourceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<SourcePlan>,
}

#[derive(Debug, Serialize)]
struct SourcePlan {
    symbol: Symbol,
    order: Vec<ProviderId>,
}

pub fn run(
    cli: &Cli,
    args: &SourcesArgs,
    settings: &Settings,
    strategy: &SourceStrategy,
) -> Result<usize, CliError> {
    let router = build_router(settings);
    let registered = router.registered_sources();

    let sources = ProviderId::ALL
        .into_iter()
        .map(|id| SourceStatus {
            id,
            enabled: registered.contains(&id),
            home_region: id.home_region(),
            default_rank: ProviderId::DEFAULT_ORDER
                .iter()
                .position(|candidate| *candidate == id)
                .map(|index| index + 1),
            quota: ProviderPolicy::default_for(id).filter(|_| settings.provider_quotas),
        })
        .collect::<Vec<_>>();

    let plan = match &args.plan {
        Some(value) => {
            let symbol = Symbol::parse(value)?;
            let order = router.plan_sources(&symbol, strategy);
            Some(SourcePlan { symbol, order })
        }
        None => None,
    };

    let mut table = Table::new(vec!["source", "enabled", "region", "rank", "quota"]);
    for source in &sources {
        table.push(vec![
            source.id.to_string(),
            source.enabled.to_string(),
            source.home_region.unwrap_or("-").to_owned(),
            source
                .default_rank
                .map_or_else(|| String::from("-"), |rank| rank.to_string()),
            source.quota.as_ref().map_or_else(
                || String::from("-"),
                |policy| {
                    format!(
                        "{}/{}s",
                        policy.quota_limit,
                        policy.quota_window.as_secs()
                    )
                },
            ),
        ]);
    }

    let note = plan.as_ref().map(|plan| {
        let order = plan
            .order
            .iter()
            .map(|provider| provider.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        format!("plan for {}: {order}", plan.symbol)
    });

    let data = SourcesData {
        strategy: strategy.to_string(),
        sources,
        plan,
    };
    let mut rendered = CommandOutput::new(serde_json::to_value(&data)?, table);
    if let Some(note) = note {
        rendered = rendered.with_note(note);
    }

    output::render(&rendered, cli.format, cli.pretty)?;
    Ok(0)
}
