// Gradient budget-perturbation loop

use crate::config::AceeiConfig;
use crate::demand::{bundle_options, require_budgets};
use crate::error::SearchError;
use crate::instance::Instance;
use crate::pool::WorkerPool;
use crate::sink::{AllocationSink, CommitSummary, commit_allocation};
use crate::trace::SearchTrace;
use crate::types::{AgentId, Allocation, Budgets, NORM_TOLERANCE, PriceVector};

use super::budget_solver::{BudgetPerturbation, BudgetSolver};

/// Final (or best) state of an ACEEI run.
#[derive(Debug, Clone)]
pub struct AceeiReport {
    pub prices: PriceVector,
    /// Perturbed budgets, each within `epsilon` of the initial one.
    pub budgets: Budgets,
    pub allocation: Allocation,
    pub clearing_error: f64,
    pub iterations: u32,
    /// Agents left with the empty bundle.
    pub infeasible_agents: Vec<AgentId>,
    /// Empty unless the run converged.
    pub commit: CommitSummary,
}

impl AceeiReport {
    fn from_perturbation(prices: &PriceVector, solved: &BudgetPerturbation, iterations: u32) -> Self {
        Self {
            prices: prices.clone(),
            budgets: solved.budgets(),
            allocation: solved.allocation(),
            clearing_error: solved.clearing_error,
            iterations,
            infeasible_agents: solved
                .choices
                .iter()
                .filter(|(_, choice)| choice.bundle.is_empty())
                .map(|(&agent, _)| agent)
                .collect(),
            commit: CommitSummary::default(),
        }
    }
}

/// Prices start at zero and move by `step` times the clipped excess demand
/// until the budget solver reports a cleared market.
pub struct AceeiSearch {
    config: AceeiConfig,
}

impl AceeiSearch {
    pub fn new(config: AceeiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AceeiConfig {
        &self.config
    }

    pub fn run(
        &self,
        instance: &dyn Instance,
        budgets: &Budgets,
        solver: &dyn BudgetSolver,
        sink: &mut dyn AllocationSink,
        trace: &SearchTrace,
    ) -> Result<AceeiReport, SearchError> {
        self.config.validate()?;
        require_budgets(instance, budgets)?;

        let pool = WorkerPool::new(self.config.worker_threads);
        let mut prices = PriceVector::zeros(instance.items().len());
        let mut best: Option<AceeiReport> = None;
        let mut iteration: u32 = 0;

        loop {
            iteration += 1;

            let options = bundle_options(instance, &prices, budgets, self.config.epsilon, &pool);
            let solved = solver
                .solve(&options, instance, &prices, self.config.tie_break, budgets)
                .ok_or(SearchError::InfeasibleBudgets { iteration })?;
            trace.aceei_iteration(iteration, solved.clearing_error, &prices);

            let report = AceeiReport::from_perturbation(&prices, &solved, iteration);
            for &agent in &report.infeasible_agents {
                trace.infeasible_agent(agent);
            }

            if solved.clearing_error <= NORM_TOLERANCE {
                trace.terminated("aceei", "cleared", iteration, solved.clearing_error);
                let commit = commit_allocation(sink, &report.allocation, trace);
                return Ok(AceeiReport { commit, ..report });
            }

            if best.as_ref().is_none_or(|b| report.clearing_error < b.clearing_error) {
                best = Some(report);
            }

            if iteration >= self.config.max_iterations {
                trace.terminated("aceei", "iteration_limit", iteration, solved.clearing_error);
                return Err(match best {
                    Some(best) => SearchError::NonConvergence {
                        iterations: iteration,
                        best: Box::new(best),
                    },
                    None => SearchError::InfeasibleBudgets { iteration },
                });
            }

            prices = prices.stepped(self.config.step, &solved.excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aceei::{ExhaustiveBudgetSolver, TieBreak};
    use crate::instance::Market;
    use crate::sink::AllocationBuilder;

    fn avi_beni() -> (Market, Budgets) {
        let market = Market::from_json(
            r#"{
                "valuations": {"avi": {"x": 1, "y": 2, "z": 4}, "beni": {"x": 2, "y": 3, "z": 1}},
                "agent_capacities": 2,
                "item_capacities": {"x": 1, "y": 1, "z": 2}
            }"#,
        )
        .unwrap();
        let budgets = [("avi", 2.0), ("beni", 3.0)]
            .iter()
            .map(|(n, b)| (market.agent_id(n).unwrap(), *b))
            .collect();
        (market, budgets)
    }

    #[test]
    fn converges_and_commits() {
        let (market, budgets) = avi_beni();
        let search = AceeiSearch::new(
            AceeiConfig::default()
                .with_step(0.5)
                .with_epsilon(0.5)
                .with_worker_threads(1),
        );
        let mut sink = AllocationBuilder::new(&market);
        let report = search
            .run(&market, &budgets, &ExhaustiveBudgetSolver, &mut sink, &SearchTrace::disabled())
            .unwrap();

        assert!(report.clearing_error <= NORM_TOLERANCE);
        assert_eq!(report.commit.given, 4);
        assert!(report.infeasible_agents.is_empty());
        let named = market.name_allocation(sink.allocation());
        assert_eq!(named["avi"], vec!["x", "z"]);
        assert_eq!(named["beni"], vec!["y", "z"]);
        for (agent, budget) in report.budgets.iter() {
            let initial = budgets.get(agent).unwrap();
            assert!((budget - initial).abs() <= 0.5 + 1e-12, "{agent} budget left its window");
        }
    }

    #[test]
    fn iteration_cap_returns_best_state_without_committing() {
        let (market, budgets) = avi_beni();
        let search = AceeiSearch::new(
            AceeiConfig::default()
                .with_step(0.5)
                .with_epsilon(0.5)
                .with_tie_break(TieBreak::None)
                .with_max_iterations(1)
                .with_worker_threads(1),
        );
        let mut sink = AllocationBuilder::new(&market);
        let err = search
            .run(&market, &budgets, &ExhaustiveBudgetSolver, &mut sink, &SearchTrace::disabled())
            .unwrap_err();

        match err {
            SearchError::NonConvergence { iterations, best } => {
                assert_eq!(iterations, 1);
                assert!(best.clearing_error > 0.0);
                assert_eq!(best.prices, PriceVector::zeros(3));
            }
            other => panic!("expected NonConvergence, got {other}"),
        }
        assert!(sink.allocation().values().all(|bundle| bundle.is_empty()));
    }
}
