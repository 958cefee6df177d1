use std::time::Duration;

use microgrid_ems::error::SchedulerError;
use microgrid_ems::optimizer::{
    EconomicDispatch, Generator, GoodLpSolver, ResultValidator, Scheduler, SolverConfig,
};

fn scheduler() -> Scheduler {
    Scheduler::new(
        Box::new(GoodLpSolver::new()),
        SolverConfig {
            time_budget: Duration::from_secs(30),
        },
        ResultValidator::default(),
    )
}

#[tokio::test]
async fn cheapest_units_are_dispatched_first() {
    let outcome = scheduler()
        .economic_dispatch(&EconomicDispatch::reference())
        .await
        .unwrap();

    let expected = [500.0, 400.0, 100.0];
    for (got, want) in outcome.output_mw.iter().zip(expected) {
        assert!((got - want).abs() < 1e-6, "got {:?}", outcome.output_mw);
    }
    assert!((outcome.total_cost - 23000.0).abs() < 1e-6);
}

#[tokio::test]
async fn demand_above_capacity_is_infeasible() {
    let mut dispatch = EconomicDispatch::reference();
    dispatch.demand_mw = 1600.0;
    let err = scheduler().economic_dispatch(&dispatch).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Infeasible));
}

#[tokio::test]
async fn demand_below_minimum_output_is_infeasible() {
    let dispatch = EconomicDispatch {
        generators: vec![
            Generator { min_mw: 100.0, max_mw: 500.0, cost_per_mwh: 20.0 },
            Generator { min_mw: 100.0, max_mw: 600.0, cost_per_mwh: 25.0 },
        ],
        demand_mw: 150.0,
    };
    let err = scheduler().economic_dispatch(&dispatch).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Infeasible));
}
