// Demand substrate shared by both drivers: bundle enumeration, per-agent
// best bundles and excess demand.

pub mod best_bundle;
pub mod combinations;
pub mod excess;

pub use best_bundle::{
    AgentDemand, BudgetOptions, best_bundles, best_bundles_for_agent, bundle_options,
    bundle_options_for_agent, candidate_allocations,
};
pub use combinations::{Combinations, bundles_up_to};
pub use excess::{clipped_excess_demand, excess_demand, min_excess_demand_allocation};

use crate::error::SearchError;
use crate::instance::Instance;
use crate::types::Budgets;

/// Every agent of the instance must have a finite budget.
pub fn require_budgets(instance: &dyn Instance, budgets: &Budgets) -> Result<(), SearchError> {
    for &agent in instance.agents() {
        match budgets.get(agent) {
            Some(budget) if budget.is_finite() => {}
            Some(budget) => {
                return Err(SearchError::InvalidParameter {
                    name: "budgets",
                    reason: format!("{agent} has non-finite budget {budget}"),
                });
            }
            None => return Err(SearchError::MissingBudget { agent }),
        }
    }
    Ok(())
}
