// Equivalence classes of price vectors, kept as plain constraint data

use serde::Serialize;

use crate::demand::bundles_up_to;
use crate::instance::Instance;
use crate::types::{AgentId, Allocation, Budget, Budgets, Bundle, PriceVector};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `price(items) <= bound`
    AtMost,
    /// `price(items) > bound`
    Exceeds,
}

/// A linear constraint on the prices of one bundle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Constraint {
    pub agent: AgentId,
    pub items: Bundle,
    pub bound: Budget,
    pub comparison: Comparison,
}

impl Constraint {
    pub fn holds(&self, prices: &PriceVector) -> bool {
        let price = self.items.price(prices);
        match self.comparison {
            Comparison::AtMost => price <= self.bound,
            Comparison::Exceeds => price > self.bound,
        }
    }
}

/// The price region in which every agent would keep its current bundle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn is_satisfied(&self, prices: &PriceVector) -> bool {
        self.constraints.iter().all(|c| c.holds(prices))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Constraint sets of every visited state, oldest first.
#[derive(Clone, Debug, Default)]
pub struct TabuHistory {
    visited: Vec<ConstraintSet>,
}

impl TabuHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, set: ConstraintSet) {
        self.visited.push(set);
    }

    /// A vector is tabu when it falls inside any visited region.
    pub fn is_tabu(&self, prices: &PriceVector) -> bool {
        self.visited.iter().any(|set| set.is_satisfied(prices))
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

/// Describes every price vector under which `allocation` stays each agent's
/// choice at `budgets`.
///
/// Per agent: the held bundle stays affordable, and every combination worth
/// at least as much stays unaffordable. Combinations enumerated after the
/// held bundle with the same size are not constrained.
pub fn find_all_equivalent_prices(
    instance: &dyn Instance,
    budgets: &Budgets,
    allocation: &Allocation,
) -> ConstraintSet {
    let mut set = ConstraintSet::default();
    let empty = Bundle::empty();

    // Budget adherence
    for &agent in instance.agents() {
        let Some(budget) = budgets.get(agent) else {
            continue;
        };
        let held = allocation.get(&agent).unwrap_or(&empty);
        set.push(Constraint {
            agent,
            items: held.clone(),
            bound: budget,
            comparison: Comparison::AtMost,
        });
    }

    // Non-improvement
    for &agent in instance.agents() {
        let Some(budget) = budgets.get(agent) else {
            continue;
        };
        let held = allocation.get(&agent).unwrap_or(&empty);
        let held_value = instance.agent_bundle_value(agent, held.items());
        let mut seen_held = false;

        for combination in bundles_up_to(instance.items(), instance.agent_capacity(agent)) {
            if combination.as_slice() == held.items() {
                seen_held = true;
                continue;
            }
            if seen_held && combination.len() == held.len() {
                continue;
            }
            if instance.agent_bundle_value(agent, &combination) >= held_value {
                set.push(Constraint {
                    agent,
                    items: Bundle::from(combination),
                    bound: budget,
                    comparison: Comparison::Exceeds,
                });
            }
        }
    }

    set
}
