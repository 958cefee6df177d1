use serde::{Deserialize, Serialize};

/// Number of steps in a scheduling horizon (hourly, one day)
pub const HORIZON: usize = 24;

/// Outcome reported by a solver for one solve call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Timeout,
}

/// Scheduling strategy that produced a schedule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    /// Imbalance minimisation over a signed battery output (simple dynamics)
    Imbalance,
    /// Dispatch with curtailment and load shedding (enhanced dynamics)
    Dispatch,
    /// Heuristic baseline, no solver involved
    RuleBased,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "imbalance" => Ok(Strategy::Imbalance),
            "dispatch" => Ok(Strategy::Dispatch),
            "rule_based" | "rule-based" => Ok(Strategy::RuleBased),
            _ => Err(format!("Unknown strategy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_round_trips_through_display() {
        for strategy in [Strategy::Imbalance, Strategy::Dispatch, Strategy::RuleBased] {
            let parsed: Strategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
        assert!("greedy".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SolveStatus::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
