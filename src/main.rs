use anyhow::{Context, Result};
use microgrid_ems::optimizer::{GoodLpSolver, ResultValidator, Scheduler};
use microgrid_ems::{config, domain::Strategy, error::SchedulerError, telemetry};
use config::Config;
use serde_json::json;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut cfg = Config::load()?;
    if let Some(strategy) = std::env::args().nth(1) {
        cfg.override_strategy(&strategy)?;
    }
    let request = cfg.schedule_request()?;
    let scheduler = Scheduler::new(
        Box::new(GoodLpSolver::new()),
        cfg.solver_config()?,
        ResultValidator::new(cfg.schedule.tolerance),
    );

    info!(
        strategy = %request.strategy,
        time_budget_ms = scheduler.config().time_budget.as_millis() as u64,
        "starting schedule run"
    );

    let report = scheduler
        .run(&request)
        .await
        .with_context(|| format!("{} schedule failed", request.strategy))?;

    let baseline = if request.strategy == Strategy::RuleBased {
        None
    } else {
        match scheduler.schedule_rule_based(&request.scenario, &request.battery) {
            Ok(baseline) => Some(baseline),
            Err(SchedulerError::Validation(violation)) => {
                warn!(%violation, "rule-based baseline breaks battery limits");
                None
            }
            Err(e) => return Err(e).context("rule-based baseline failed"),
        }
    };

    let output = json!({
        "schedule": report.schedule,
        "charging_pattern": report.schedule.charging_pattern(),
        "summary": report.summary,
        "baseline": baseline.map(|b| b.summary),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!(
        curtailment = report.summary.total_curtailment,
        shedding = report.summary.total_shedding,
        final_soc = report.summary.final_soc,
        "schedule run complete"
    );
    Ok(())
}
