// Budget perturbation: pick one (budget, bundle) option per agent so the
// clipped clearing error is as small as possible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::demand::{BudgetOptions, clipped_excess_demand};
use crate::instance::Instance;
use crate::types::{AgentId, Allocation, Budget, Budgets, Bundle, ExcessDemand, PriceVector};

/// Envy constraints between agents with different initial budgets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    None,
    /// An agent with a larger initial budget never strictly prefers the
    /// bundle of an agent with a smaller one.
    EnvyFree,
    /// Like `EnvyFree`, restricted to bundles holding a priced item.
    ContestedEnvyFree,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetChoice {
    pub budget: Budget,
    pub bundle: Bundle,
}

/// Solver output.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetPerturbation {
    pub choices: BTreeMap<AgentId, BudgetChoice>,
    /// L2 norm of `excess`.
    pub clearing_error: f64,
    /// Clipped excess demand of the chosen bundles.
    pub excess: ExcessDemand,
}

impl BudgetPerturbation {
    pub fn allocation(&self) -> Allocation {
        self.choices
            .iter()
            .map(|(&agent, choice)| (agent, choice.bundle.clone()))
            .collect()
    }

    pub fn budgets(&self) -> Budgets {
        self.choices
            .iter()
            .map(|(&agent, choice)| (agent, choice.budget))
            .collect()
    }
}

/// Chooses per-agent budgets from the window options.
pub trait BudgetSolver: Sync {
    /// `None` when no combination of options satisfies the tie-break.
    fn solve(
        &self,
        options: &[(AgentId, BudgetOptions)],
        instance: &dyn Instance,
        prices: &PriceVector,
        tie_break: TieBreak,
        initial_budgets: &Budgets,
    ) -> Option<BudgetPerturbation>;
}

/// Walks the whole product of per-agent options (first agent outermost, last
/// agent varying fastest) and keeps the first choice with minimal clearing
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveBudgetSolver;

impl BudgetSolver for ExhaustiveBudgetSolver {
    fn solve(
        &self,
        options: &[(AgentId, BudgetOptions)],
        instance: &dyn Instance,
        prices: &PriceVector,
        tie_break: TieBreak,
        initial_budgets: &Budgets,
    ) -> Option<BudgetPerturbation> {
        if options.iter().any(|(_, agent_options)| agent_options.is_empty()) {
            return None;
        }

        let mut indices = vec![0usize; options.len()];
        let mut best: Option<(Vec<usize>, ExcessDemand, f64)> = None;

        'product: loop {
            let allocation: Allocation = options
                .iter()
                .zip(&indices)
                .map(|((agent, agent_options), &idx)| (*agent, agent_options[idx].1.clone()))
                .collect();

            if respects_tie_break(instance, prices, tie_break, initial_budgets, &allocation) {
                let excess = clipped_excess_demand(instance, prices, &allocation);
                let norm = excess.norm();
                if best.as_ref().is_none_or(|(_, _, best_norm)| norm < *best_norm) {
                    best = Some((indices.clone(), excess, norm));
                    if norm == 0.0 {
                        break 'product;
                    }
                }
            }

            let mut pos = indices.len();
            loop {
                if pos == 0 {
                    break 'product;
                }
                pos -= 1;
                indices[pos] += 1;
                if indices[pos] < options[pos].1.len() {
                    break;
                }
                indices[pos] = 0;
            }
        }

        best.map(|(chosen, excess, clearing_error)| BudgetPerturbation {
            choices: options
                .iter()
                .zip(chosen)
                .map(|((agent, agent_options), idx)| {
                    let (budget, bundle) = &agent_options[idx];
                    (
                        *agent,
                        BudgetChoice {
                            budget: *budget,
                            bundle: bundle.clone(),
                        },
                    )
                })
                .collect(),
            clearing_error,
            excess,
        })
    }
}

/// Checks every ordered pair (i, j) with `b_i > b_j`.
pub fn respects_tie_break(
    instance: &dyn Instance,
    prices: &PriceVector,
    tie_break: TieBreak,
    initial_budgets: &Budgets,
    allocation: &Allocation,
) -> bool {
    if tie_break == TieBreak::None {
        return true;
    }

    for (&richer, own) in allocation {
        let Some(richer_budget) = initial_budgets.get(richer) else {
            continue;
        };
        let own_value = instance.agent_bundle_value(richer, own.items());

        for (&poorer, other) in allocation {
            if !initial_budgets.get(poorer).is_some_and(|budget| budget < richer_budget) {
                continue;
            }
            if tie_break == TieBreak::ContestedEnvyFree
                && !other.items().iter().any(|&item| !prices.is_free(item))
            {
                continue;
            }
            if instance.agent_bundle_value(richer, other.items()) > own_value {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Market;

    fn market() -> Market {
        Market::from_json(
            r#"{
                "valuations": {"avi": {"x": 5, "y": 2, "z": 1}, "beni": {"x": 4, "y": 1, "z": 3}},
                "agent_capacities": 2,
                "item_capacities": {"x": 1, "y": 1, "z": 2}
            }"#,
        )
        .unwrap()
    }

    fn ids(m: &Market) -> (AgentId, AgentId) {
        (m.agent_id("avi").unwrap(), m.agent_id("beni").unwrap())
    }

    #[test]
    fn picks_first_minimal_choice() {
        let m = market();
        let (avi, beni) = ids(&m);
        let prices = PriceVector::from_vec(vec![1.0, 0.5, 0.0]);
        let budgets: Budgets = [(avi, 3.0), (beni, 4.0)].into_iter().collect();
        let options = vec![
            (avi, vec![(2.0, m.bundle(&["x", "z"]).unwrap())]),
            (
                beni,
                vec![
                    (4.5, m.bundle(&["x", "z"]).unwrap()),
                    (3.5, m.bundle(&["y", "z"]).unwrap()),
                ],
            ),
        ];

        let solved = ExhaustiveBudgetSolver
            .solve(&options, &m, &prices, TieBreak::None, &budgets)
            .unwrap();
        assert_eq!(solved.clearing_error, 0.0);
        assert_eq!(solved.choices[&beni].budget, 3.5);
        assert_eq!(solved.allocation()[&beni], m.bundle(&["y", "z"]).unwrap());
        assert_eq!(solved.budgets().get(avi), Some(2.0));
    }

    #[test]
    fn envy_free_rejects_envious_richer_agent() {
        let m = market();
        let (avi, beni) = ids(&m);
        let prices = PriceVector::from_vec(vec![1.0, 1.0, 1.0]);
        let xz = m.bundle(&["x", "z"]).unwrap();
        let yz = m.bundle(&["y", "z"]).unwrap();

        // beni is richer and values x+z (7) over y+z (4)
        let budgets: Budgets = [(avi, 3.0), (beni, 4.0)].into_iter().collect();
        let mut allocation = Allocation::new();
        allocation.insert(avi, xz.clone());
        allocation.insert(beni, yz.clone());
        assert!(respects_tie_break(&m, &prices, TieBreak::None, &budgets, &allocation));
        assert!(!respects_tie_break(&m, &prices, TieBreak::EnvyFree, &budgets, &allocation));

        allocation.insert(avi, yz);
        allocation.insert(beni, xz);
        assert!(respects_tie_break(&m, &prices, TieBreak::EnvyFree, &budgets, &allocation));
    }

    #[test]
    fn contested_envy_ignores_free_bundles() {
        let m = market();
        let (avi, beni) = ids(&m);
        let prices = PriceVector::from_vec(vec![0.0, 1.0, 0.0]);
        let budgets: Budgets = [(avi, 3.0), (beni, 4.0)].into_iter().collect();
        let mut allocation = Allocation::new();
        allocation.insert(avi, m.bundle(&["x", "z"]).unwrap());
        allocation.insert(beni, m.bundle(&["y", "z"]).unwrap());

        assert!(!respects_tie_break(&m, &prices, TieBreak::EnvyFree, &budgets, &allocation));
        assert!(
            respects_tie_break(&m, &prices, TieBreak::ContestedEnvyFree, &budgets, &allocation),
            "x+z is free, so envy towards it does not count"
        );
    }

    #[test]
    fn no_feasible_choice_gives_none() {
        let m = market();
        let (avi, beni) = ids(&m);
        let prices = PriceVector::from_vec(vec![1.0, 1.0, 1.0]);
        let budgets: Budgets = [(avi, 3.0), (beni, 4.0)].into_iter().collect();
        let options = vec![
            (avi, vec![(2.5, m.bundle(&["x", "z"]).unwrap())]),
            (beni, vec![(3.5, m.bundle(&["y", "z"]).unwrap())]),
        ];
        assert!(
            ExhaustiveBudgetSolver
                .solve(&options, &m, &prices, TieBreak::EnvyFree, &budgets)
                .is_none()
        );
    }
}
