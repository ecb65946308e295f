// Tabu search over price vectors

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::TabuConfig;
use crate::demand::{
    best_bundles, candidate_allocations, clipped_excess_demand, min_excess_demand_allocation, require_budgets,
};
use crate::error::SearchError;
use crate::instance::Instance;
use crate::pool::WorkerPool;
use crate::sink::{AllocationSink, CommitSummary, commit_allocation};
use crate::trace::SearchTrace;
use crate::types::{AgentId, Allocation, Budgets, Bundle, ExcessDemand, NORM_TOLERANCE, PriceVector};

use super::equivalence::{TabuHistory, find_all_equivalent_prices};
use super::neighbors::{AdjustmentRules, find_all_neighbors};

// === RESULT TYPES ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Reached a price vector with zero clearing error.
    Cleared,
    /// Every neighbor was tabu.
    Stuck,
    IterationLimit,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Termination::Cleared => "cleared",
            Termination::Stuck => "stuck",
            Termination::IterationLimit => "iteration_limit",
        }
    }
}

/// Best state found by a tabu run, already committed to the sink.
#[derive(Debug, Clone)]
pub struct TabuReport {
    pub prices: PriceVector,
    pub allocation: Allocation,
    pub clearing_error: f64,
    pub iterations: u32,
    pub termination: Termination,
    /// Agents that could afford nothing at the best prices.
    pub infeasible_agents: Vec<AgentId>,
    pub commit: CommitSummary,
}

/// One evaluated price vector.
#[derive(Debug, Clone)]
struct Evaluation {
    prices: PriceVector,
    allocation: Allocation,
    excess: ExcessDemand,
    norm: f64,
    infeasible: Vec<AgentId>,
}

// === DRIVER ===

pub struct TabuSearch {
    config: TabuConfig,
}

impl TabuSearch {
    pub fn new(config: TabuConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TabuConfig {
        &self.config
    }

    /// Draws initial prices uniformly from `[1, 1 + beta]` and searches.
    pub fn run(
        &self,
        instance: &dyn Instance,
        budgets: &Budgets,
        sink: &mut dyn AllocationSink,
        trace: &SearchTrace,
    ) -> Result<TabuReport, SearchError> {
        self.config.validate()?;
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let upper = 1.0 + self.config.beta;
        let prices = PriceVector::from_vec(
            instance
                .items()
                .iter()
                .map(|_| rng.random_range(1.0..=upper))
                .collect(),
        );
        self.run_from_prices(instance, budgets, prices, sink, trace)
    }

    /// Searches from the given starting prices.
    pub fn run_from_prices(
        &self,
        instance: &dyn Instance,
        budgets: &Budgets,
        prices: PriceVector,
        sink: &mut dyn AllocationSink,
        trace: &SearchTrace,
    ) -> Result<TabuReport, SearchError> {
        self.config.validate()?;
        require_budgets(instance, budgets)?;
        if prices.len() != instance.items().len() {
            return Err(SearchError::InvalidParameter {
                name: "prices",
                reason: format!(
                    "expected {} prices, got {}",
                    instance.items().len(),
                    prices.len()
                ),
            });
        }

        let pool = WorkerPool::new(self.config.worker_threads);
        let steps = self.config.sorted_steps();
        let rules = AdjustmentRules {
            max_neighbors: self.config.max_adjustment_neighbors,
            increment: self.config.adjustment_increment,
            max_steps: self.config.adjustment_max_steps,
        };

        let mut history = TabuHistory::new();
        let mut current = evaluate(instance, budgets, prices, &pool);
        let mut best = current.clone();
        let mut iteration: u32 = 0;

        let termination = loop {
            iteration += 1;
            trace.tabu_iteration(iteration, current.norm, best.norm, history.len());
            for &agent in &current.infeasible {
                trace.infeasible_agent(agent);
            }

            if current.norm <= NORM_TOLERANCE {
                break Termination::Cleared;
            }
            if iteration >= self.config.max_iterations {
                break Termination::IterationLimit;
            }

            history.push(find_all_equivalent_prices(instance, budgets, &current.allocation));
            let neighborhood = find_all_neighbors(
                instance,
                budgets,
                &current.prices,
                &steps,
                &current.excess,
                &current.allocation,
                &history,
                &rules,
                &pool,
            );
            trace.tabu_neighbors(iteration, neighborhood.gradient, neighborhood.adjustment);

            // Move to the best neighbor even when it is worse than the current state
            let mut next: Option<Evaluation> = None;
            for candidate in neighborhood.candidates {
                let evaluated = evaluate(instance, budgets, candidate, &pool);
                if next.as_ref().is_none_or(|n| evaluated.norm < n.norm) {
                    next = Some(evaluated);
                }
            }
            let Some(next) = next else {
                break Termination::Stuck;
            };

            current = next;
            if current.norm < best.norm {
                best = current.clone();
            }
        };

        trace.terminated("tabu", termination.as_str(), iteration, best.norm);
        let commit = commit_allocation(sink, &best.allocation, trace);

        Ok(TabuReport {
            prices: best.prices,
            allocation: best.allocation,
            clearing_error: best.norm,
            iterations: iteration,
            termination,
            infeasible_agents: best.infeasible,
            commit,
        })
    }
}

/// Fixed-budget demand at `prices`, reduced to the candidate allocation with
/// the smallest clipped clearing error.
fn evaluate(instance: &dyn Instance, budgets: &Budgets, prices: PriceVector, pool: &WorkerPool) -> Evaluation {
    let demands = best_bundles(instance, &prices, budgets, pool);
    let infeasible = demands
        .iter()
        .filter(|(_, demand)| demand.infeasible)
        .map(|(agent, _)| *agent)
        .collect();
    let candidates = candidate_allocations(&demands, &prices, budgets);

    let (allocation, excess) = match min_excess_demand_allocation(instance, &prices, &candidates) {
        Some((allocation, excess)) => (allocation.clone(), excess),
        None => {
            let nobody: Allocation = instance
                .agents()
                .iter()
                .map(|&agent| (agent, Bundle::empty()))
                .collect();
            let excess = clipped_excess_demand(instance, &prices, &nobody);
            (nobody, excess)
        }
    };
    let norm = excess.norm();

    Evaluation {
        prices,
        allocation,
        excess,
        norm,
        infeasible,
    }
}
