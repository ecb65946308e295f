// Per-agent demand: which affordable bundles an agent wants at given prices

use crate::instance::Instance;
use crate::pool::WorkerPool;
use crate::types::{AgentId, Allocation, Budget, Budgets, Bundle, ItemId, PriceVector, VALUE_EPSILON, Value};

use super::combinations::bundles_up_to;

// === FIXED-BUDGET MODE ===

/// Best affordable bundles of one agent at a fixed budget.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentDemand {
    /// All maximal-value affordable bundles, in enumeration order. Never
    /// empty: holds the empty bundle when nothing is affordable.
    pub bundles: Vec<Bundle>,
    /// Nothing non-empty was affordable.
    pub infeasible: bool,
}

/// Every affordable combination whose raw value ties the maximum.
pub fn best_bundles_for_agent(
    instance: &dyn Instance,
    agent: AgentId,
    prices: &PriceVector,
    budget: Budget,
) -> AgentDemand {
    let mut ranked: Vec<(Value, Vec<ItemId>)> = bundles_up_to(instance.items(), instance.agent_capacity(agent))
        .into_iter()
        .map(|items| (instance.agent_bundle_value(agent, &items), items))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut best_value: Option<Value> = None;
    let mut bundles = Vec::new();
    for (value, items) in ranked {
        if best_value.is_some_and(|best| value < best - VALUE_EPSILON) {
            break;
        }
        if prices.bundle_price(&items) > budget {
            continue;
        }
        if best_value.is_none() {
            best_value = Some(value);
        }
        bundles.push(Bundle::from(items));
    }

    if bundles.is_empty() {
        return AgentDemand {
            bundles: vec![Bundle::empty()],
            infeasible: true,
        };
    }
    AgentDemand {
        bundles,
        infeasible: false,
    }
}

/// Fixed-budget demand for every agent, evaluated on the pool. Agents without
/// a budget can afford nothing.
pub fn best_bundles(
    instance: &dyn Instance,
    prices: &PriceVector,
    budgets: &Budgets,
    pool: &WorkerPool,
) -> Vec<(AgentId, AgentDemand)> {
    pool.map_agents(instance.agents(), |agent| {
        let budget = budgets.get(agent).unwrap_or(f64::NEG_INFINITY);
        best_bundles_for_agent(instance, agent, prices, budget)
    })
}

/// Cartesian product of the per-agent best bundles (first agent outermost,
/// last agent varying fastest), keeping only allocations every agent can
/// afford.
pub fn candidate_allocations(
    demands: &[(AgentId, AgentDemand)],
    prices: &PriceVector,
    budgets: &Budgets,
) -> Vec<Allocation> {
    let mut candidates: Vec<Allocation> = vec![Allocation::new()];
    for (agent, demand) in demands {
        let budget = budgets.get(*agent).unwrap_or(f64::NEG_INFINITY);
        let affordable: Vec<&Bundle> = demand
            .bundles
            .iter()
            .filter(|bundle| bundle.is_empty() || bundle.price(prices) <= budget)
            .collect();

        let mut extended = Vec::with_capacity(candidates.len() * affordable.len().max(1));
        for partial in &candidates {
            for bundle in &affordable {
                let mut allocation = partial.clone();
                allocation.insert(*agent, (*bundle).clone());
                extended.push(allocation);
            }
        }
        candidates = extended;
    }
    candidates
}

// === BUDGET-WINDOW MODE ===

/// One agent's demand across `[budget - epsilon, budget + epsilon]`: pairs of
/// (budget threshold, bundle bought from that threshold up to the previous
/// one), thresholds descending. The last entry is always at `budget - epsilon`.
pub type BudgetOptions = Vec<(Budget, Bundle)>;

/// Walks combinations by value (full bundles boosted by the agent's maximum
/// value) and records each price point inside the window at which a cheaper
/// bundle becomes the best one.
pub fn bundle_options_for_agent(
    instance: &dyn Instance,
    agent: AgentId,
    prices: &PriceVector,
    budget: Budget,
    epsilon: f64,
) -> BudgetOptions {
    let capacity = instance.agent_capacity(agent);
    let full_bonus = instance.agent_maximum_value(agent);

    let mut ranked: Vec<(Value, Vec<ItemId>)> = bundles_up_to(instance.items(), capacity)
        .into_iter()
        .map(|items| {
            let bonus = if items.len() == capacity { full_bonus } else { 0.0 };
            (instance.agent_bundle_value(agent, &items) + bonus, items)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let min_budget = budget - epsilon;
    let max_budget = budget + epsilon;
    let mut min_price = f64::INFINITY;
    let mut options = BudgetOptions::new();

    for (_, items) in ranked {
        let price = prices.bundle_price(&items);
        if price > max_budget {
            continue;
        }
        if price <= min_budget {
            options.push((min_budget, Bundle::from(items)));
            return options;
        }
        if price < min_price {
            min_price = price;
            options.push((price, Bundle::from(items)));
        }
    }

    // Nothing affordable at the bottom of the window
    options.push((min_budget, Bundle::empty()));
    options
}

/// Window-mode demand for every agent.
pub fn bundle_options(
    instance: &dyn Instance,
    prices: &PriceVector,
    budgets: &Budgets,
    epsilon: f64,
    pool: &WorkerPool,
) -> Vec<(AgentId, BudgetOptions)> {
    pool.map_agents(instance.agents(), |agent| {
        let budget = budgets.get(agent).unwrap_or(0.0);
        bundle_options_for_agent(instance, agent, prices, budget, epsilon)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Market, MarketSpec};

    fn market(json: &str) -> Market {
        let spec: MarketSpec = serde_json::from_str(json).unwrap();
        Market::from_spec(&spec).unwrap()
    }

    fn prices(market: &Market, named: &[(&str, f64)]) -> PriceVector {
        let mut prices = PriceVector::zeros(market.items().len());
        for (name, price) in named {
            prices.set(market.item_id(name).unwrap(), *price);
        }
        prices
    }

    fn three_agents() -> Market {
        market(
            r#"{
                "valuations": {
                    "Alice": {"x": 3, "y": 4, "z": 2},
                    "Bob": {"x": 4, "y": 3, "z": 2},
                    "Eve": {"x": 2, "y": 4, "z": 3}
                },
                "agent_capacities": 2,
                "item_capacities": {"x": 2, "y": 1, "z": 3}
            }"#,
        )
    }

    #[test]
    fn fixed_budget_picks_highest_affordable_value() {
        let m = three_agents();
        let p = prices(&m, &[("x", 1.0), ("y", 2.0), ("z", 1.0)]);
        let budgets: Budgets = [("Alice", 5.0), ("Bob", 4.0), ("Eve", 3.0)]
            .iter()
            .map(|(n, b)| (m.agent_id(n).unwrap(), *b))
            .collect();

        let demands = best_bundles(&m, &p, &budgets, &WorkerPool::sequential());
        let candidates = candidate_allocations(&demands, &p, &budgets);
        assert_eq!(candidates.len(), 1);
        let named = m.name_allocation(&candidates[0]);
        assert_eq!(named["Alice"], vec!["x", "y"]);
        assert_eq!(named["Bob"], vec!["x", "y"]);
        assert_eq!(named["Eve"], vec!["y", "z"]);
    }

    #[test]
    fn fixed_budget_keeps_all_ties() {
        let m = market(
            r#"{
                "valuations": {
                    "Alice": {"w": 3, "x": 3, "y": 3, "z": 3},
                    "Bob": {"w": 3, "x": 3, "y": 3, "z": 3},
                    "Eve": {"w": 4, "x": 4, "y": 4, "z": 4}
                },
                "agent_capacities": 2,
                "item_capacities": {"w": 1, "x": 1, "y": 2, "z": 2}
            }"#,
        );
        let p = prices(
            &m,
            &[("x", 2.6124658024539347), ("y", 0.0), ("z", 1.1604071365185367), ("w", 5.930224022321449)],
        );
        let budgets: Budgets = [("Alice", 4.0), ("Bob", 5.0), ("Eve", 2.0)]
            .iter()
            .map(|(n, b)| (m.agent_id(n).unwrap(), *b))
            .collect();

        let demands = best_bundles(&m, &p, &budgets, &WorkerPool::sequential());
        let alice = &demands[0].1;
        let eve = &demands[2].1;
        assert_eq!(alice.bundles.len(), 3, "x+y, x+z and y+z all cost at most 4");
        assert_eq!(eve.bundles, vec![m.bundle(&["y", "z"]).unwrap()]);
        assert_eq!(candidate_allocations(&demands, &p, &budgets).len(), 9);
    }

    #[test]
    fn unaffordable_agent_falls_back_to_empty_bundle() {
        let m = three_agents();
        let p = prices(&m, &[("x", 10.0), ("y", 10.0), ("z", 10.0)]);
        let alice = m.agent_id("Alice").unwrap();
        let demand = best_bundles_for_agent(&m, alice, &p, 5.0);
        assert!(demand.infeasible);
        assert_eq!(demand.bundles, vec![Bundle::empty()]);
    }

    #[test]
    fn window_records_cheaper_alternatives() {
        let m = market(
            r#"{
                "valuations": {"Alice": {"x": 5, "y": 5, "z": 1}, "Bob": {"x": 4, "y": 6, "z": 4}},
                "agent_capacities": 2,
                "item_capacities": {"x": 1, "y": 2, "z": 2}
            }"#,
        );
        let p = prices(&m, &[("x", 2.5)]);
        let alice = m.agent_id("Alice").unwrap();
        let bob = m.agent_id("Bob").unwrap();

        let alice_options = bundle_options_for_agent(&m, alice, &p, 5.0, 2.0);
        assert_eq!(alice_options, vec![(3.0, m.bundle(&["x", "y"]).unwrap())]);

        let bob_options = bundle_options_for_agent(&m, bob, &p, 4.0, 2.0);
        assert_eq!(
            bob_options,
            vec![
                (2.5, m.bundle(&["x", "y"]).unwrap()),
                (2.0, m.bundle(&["y", "z"]).unwrap()),
            ]
        );
    }

    #[test]
    fn window_prefers_full_bundles() {
        let m = market(
            r#"{
                "valuations": {"Alice": {"x": 1, "y": 1, "z": 3}},
                "agent_capacities": 2,
                "item_capacities": {"x": 1, "y": 1, "z": 2}
            }"#,
        );
        let p = prices(&m, &[("x", 2.0), ("y", 2.0), ("z", 5.0)]);
        let alice = m.agent_id("Alice").unwrap();
        let options = bundle_options_for_agent(&m, alice, &p, 5.0, 0.1);
        assert_eq!(options, vec![(4.9, m.bundle(&["x", "y"]).unwrap())]);
    }

    #[test]
    fn window_ends_with_empty_bundle_when_floor_unaffordable() {
        let m = market(
            r#"{
                "valuations": {"beni": {"x": 3}},
                "agent_capacities": 1,
                "item_capacities": {"x": 1}
            }"#,
        );
        let p = prices(&m, &[("x", 0.9)]);
        let beni = m.agent_id("beni").unwrap();
        let options = bundle_options_for_agent(&m, beni, &p, 1.0, 0.2);
        assert_eq!(
            options,
            vec![(0.9, m.bundle(&["x"]).unwrap()), (0.8, Bundle::empty())]
        );
    }
}
