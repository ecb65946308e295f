// Candidate next price vectors for the tabu search

use crate::demand::{best_bundles, candidate_allocations};
use crate::instance::Instance;
use crate::pool::WorkerPool;
use crate::types::{Allocation, Budgets, ExcessDemand, ItemId, PriceVector};

use super::equivalence::TabuHistory;

/// Limits on the single-item price adjustments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentRules {
    pub max_neighbors: usize,
    pub increment: f64,
    pub max_steps: u32,
}

/// Neighbors of one state, gradient ones first.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    pub candidates: Vec<PriceVector>,
    pub gradient: usize,
    pub adjustment: usize,
}

impl Neighborhood {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

/// `max(0, p + δ·z)` for every step δ, skipping tabu vectors. Steps are
/// expected in ascending order.
pub fn gradient_neighbors(
    prices: &PriceVector,
    steps: &[f64],
    excess: &ExcessDemand,
    history: &TabuHistory,
) -> Vec<PriceVector> {
    steps
        .iter()
        .map(|&step| prices.stepped(step, excess))
        .filter(|candidate| !history.is_tabu(candidate))
        .collect()
}

/// True when `next` differs from `current` for exactly one agent, and that
/// agent gave up `item`.
pub fn loses_single_claim(current: &Allocation, next: &Allocation, item: ItemId) -> bool {
    let mut changed = current
        .iter()
        .filter(|(agent, bundle)| next.get(*agent).is_some_and(|other| other != *bundle));

    let Some((agent, bundle)) = changed.next() else {
        return false;
    };
    if changed.next().is_some() {
        return false;
    }
    bundle.contains(item) && next.get(agent).is_some_and(|other| !other.contains(item))
}

/// Single-item moves: undersubscribed items drop to zero; oversubscribed ones
/// climb in fixed increments until exactly one agent lets go of them.
#[allow(clippy::too_many_arguments)]
pub fn individual_adjustment_neighbors(
    instance: &dyn Instance,
    budgets: &Budgets,
    prices: &PriceVector,
    excess: &ExcessDemand,
    allocation: &Allocation,
    history: &TabuHistory,
    rules: &AdjustmentRules,
    pool: &WorkerPool,
) -> Vec<PriceVector> {
    let mut accepted = Vec::new();

    for (item, z) in excess.iter() {
        if accepted.len() >= rules.max_neighbors {
            break;
        }

        if z < 0 {
            let mut candidate = prices.clone();
            candidate.set(item, 0.0);
            if !history.is_tabu(&candidate) {
                accepted.push(candidate);
            }
        } else if z > 0 {
            let mut candidate = prices.clone();
            for _ in 0..rules.max_steps {
                candidate.set(item, candidate.get(item) + rules.increment);
                if history.is_tabu(&candidate) {
                    break;
                }
                let demands = best_bundles(instance, &candidate, budgets, pool);
                let relieved = candidate_allocations(&demands, &candidate, budgets)
                    .iter()
                    .any(|next| loses_single_claim(allocation, next, item));
                if relieved {
                    accepted.push(candidate);
                    break;
                }
            }
        }
    }

    accepted
}

/// Gradient neighbors followed by individual adjustments, exact duplicates
/// removed. An empty result means the search is stuck.
#[allow(clippy::too_many_arguments)]
pub fn find_all_neighbors(
    instance: &dyn Instance,
    budgets: &Budgets,
    prices: &PriceVector,
    steps: &[f64],
    excess: &ExcessDemand,
    allocation: &Allocation,
    history: &TabuHistory,
    rules: &AdjustmentRules,
    pool: &WorkerPool,
) -> Neighborhood {
    let gradient = gradient_neighbors(prices, steps, excess, history);
    let adjustment =
        individual_adjustment_neighbors(instance, budgets, prices, excess, allocation, history, rules, pool);

    let mut neighborhood = Neighborhood {
        candidates: Vec::with_capacity(gradient.len() + adjustment.len()),
        gradient: gradient.len(),
        adjustment: adjustment.len(),
    };
    for candidate in gradient.into_iter().chain(adjustment) {
        if !neighborhood.candidates.contains(&candidate) {
            neighborhood.candidates.push(candidate);
        }
    }
    neighborhood
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::{clipped_excess_demand, min_excess_demand_allocation};
    use crate::instance::Market;
    use crate::tabu::equivalence::find_all_equivalent_prices;

    fn market() -> Market {
        Market::from_json(
            r#"{
                "valuations": {
                    "ami": {"x": 3, "y": 4, "z": 2},
                    "tami": {"x": 4, "y": 3, "z": 2},
                    "tzumi": {"x": 2, "y": 4, "z": 3}
                },
                "agent_capacities": 2,
                "item_capacities": {"x": 2, "y": 1, "z": 3}
            }"#,
        )
        .unwrap()
    }

    fn budgets(m: &Market) -> Budgets {
        [("ami", 5.0), ("tami", 4.0), ("tzumi", 3.0)]
            .iter()
            .map(|(n, b)| (m.agent_id(n).unwrap(), *b))
            .collect()
    }

    fn rules() -> AdjustmentRules {
        AdjustmentRules {
            max_neighbors: 35,
            increment: std::f64::consts::FRAC_1_SQRT_2,
            max_steps: 10,
        }
    }

    fn state(m: &Market, prices: &PriceVector, budgets: &Budgets) -> (Allocation, ExcessDemand) {
        let pool = WorkerPool::sequential();
        let demands = best_bundles(m, prices, budgets, &pool);
        let candidates = candidate_allocations(&demands, prices, budgets);
        let (allocation, excess) = min_excess_demand_allocation(m, prices, &candidates).unwrap();
        (allocation.clone(), excess)
    }

    #[test]
    fn first_iteration_neighbors() {
        let m = market();
        let b = budgets(&m);
        let prices = PriceVector::from_vec(vec![1.0, 2.0, 1.0]);
        let (allocation, excess) = state(&m, &prices, &b);
        assert_eq!(excess.as_slice(), &[0, 2, -2]);

        let mut history = TabuHistory::new();
        history.push(find_all_equivalent_prices(&m, &b, &allocation));

        let neighborhood = find_all_neighbors(
            &m,
            &b,
            &prices,
            &[0.1, 0.8],
            &excess,
            &allocation,
            &history,
            &rules(),
            &WorkerPool::sequential(),
        );

        // δ = 0.1 keeps tzumi's y+z at exactly 3.0, inside the visited region
        assert_eq!(neighborhood.gradient, 1);
        assert_eq!(neighborhood.adjustment, 1);
        assert_eq!(neighborhood.candidates[0].as_slice(), &[1.0, 3.6, 0.0]);
        assert_eq!(
            neighborhood.candidates[1].as_slice(),
            &[1.0, 2.0 + std::f64::consts::FRAC_1_SQRT_2, 1.0]
        );
    }

    #[test]
    fn raising_contested_item_until_one_agent_leaves() {
        let m = market();
        let b = budgets(&m);
        let prices = PriceVector::from_vec(vec![1.0, 3.6, 0.0]);
        let (allocation, excess) = state(&m, &prices, &b);
        let clipped = clipped_excess_demand(&m, &prices, &allocation);
        assert_eq!(clipped, excess);
        assert_eq!(excess.as_slice(), &[1, 0, 0]);

        let neighbors = individual_adjustment_neighbors(
            &m,
            &b,
            &prices,
            &excess,
            &allocation,
            &TabuHistory::new(),
            &rules(),
            &WorkerPool::sequential(),
        );
        assert_eq!(neighbors.len(), 1, "stops raising x after the first accepted step");
        assert_eq!(
            neighbors[0].as_slice(),
            &[1.0 + std::f64::consts::FRAC_1_SQRT_2, 3.6, 0.0]
        );
    }

    #[test]
    fn single_claim_loss_detection() {
        let m = market();
        let (ami, tami) = (m.agent_id("ami").unwrap(), m.agent_id("tami").unwrap());
        let x = m.item_id("x").unwrap();
        let mut current = Allocation::new();
        current.insert(ami, m.bundle(&["x", "y"]).unwrap());
        current.insert(tami, m.bundle(&["x", "z"]).unwrap());

        let mut next = current.clone();
        next.insert(ami, m.bundle(&["y", "z"]).unwrap());
        assert!(loses_single_claim(&current, &next, x));
        assert!(!loses_single_claim(&current, &next, m.item_id("y").unwrap()));

        next.insert(tami, m.bundle(&["y", "z"]).unwrap());
        assert!(!loses_single_claim(&current, &next, x), "two agents changed");
        assert!(!loses_single_claim(&current, &current, x));
    }

    #[test]
    fn adjustment_cap_limits_accepted_neighbors() {
        let m = market();
        let b = budgets(&m);
        let prices = PriceVector::from_vec(vec![1.0, 2.0, 1.0]);
        let excess = ExcessDemand::from_vec(vec![-1, -1, -1]);
        let capped = AdjustmentRules {
            max_neighbors: 2,
            ..rules()
        };
        let neighbors = individual_adjustment_neighbors(
            &m,
            &b,
            &prices,
            &excess,
            &Allocation::new(),
            &TabuHistory::new(),
            &capped,
            &WorkerPool::sequential(),
        );
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[1].as_slice(), &[1.0, 0.0, 1.0]);
    }
}
