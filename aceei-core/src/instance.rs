// Market instances: the read-only description of agents, items and valuations

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::MarketError;
use crate::types::{AgentId, Allocation, Budgets, Bundle, ItemId, PriceVector, Value};

// === INSTANCE TRAIT ===

/// Everything the search engine asks of a market.
///
/// Implementations must be `Sync`: per-agent enumeration reads the instance
/// from worker threads.
pub trait Instance: Sync {
    fn agents(&self) -> &[AgentId];
    fn items(&self) -> &[ItemId];
    fn agent_capacity(&self, agent: AgentId) -> usize;
    fn item_capacity(&self, item: ItemId) -> u32;
    fn agent_item_value(&self, agent: AgentId, item: ItemId) -> Value;

    fn agent_bundle_value(&self, agent: AgentId, items: &[ItemId]) -> Value {
        items
            .iter()
            .map(|&item| self.agent_item_value(agent, item))
            .sum()
    }

    /// Value of the best bundle that fills the agent's capacity: the sum of
    /// its `capacity` highest item values.
    fn agent_maximum_value(&self, agent: AgentId) -> Value {
        let mut values: Vec<Value> = self
            .items()
            .iter()
            .map(|&item| self.agent_item_value(agent, item))
            .collect();
        values.sort_by(|a, b| b.total_cmp(a));
        values.iter().take(self.agent_capacity(agent)).sum()
    }
}

// === SPEC (name-keyed boundary format) ===

/// Capacity given once for everybody or per name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(untagged)]
pub enum Capacities {
    Uniform(u32),
    PerName(BTreeMap<String, u32>),
}

impl Capacities {
    fn lookup(&self, name: &str) -> Option<u32> {
        match self {
            Capacities::Uniform(cap) => Some(*cap),
            Capacities::PerName(caps) => caps.get(name).copied(),
        }
    }
}

/// Name-keyed market description, e.g.
///
/// ```json
/// { "valuations": {"avi": {"x": 1, "y": 2}},
///   "agent_capacities": 2,
///   "item_capacities": {"x": 1, "y": 1} }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct MarketSpec {
    pub valuations: BTreeMap<String, BTreeMap<String, Value>>,
    pub agent_capacities: Capacities,
    pub item_capacities: Capacities,
}

// === MARKET ===

/// Interned, dense market. Agents and items are numbered in lexicographic
/// order of their names, which fixes every enumeration order downstream.
#[derive(Clone, Debug)]
pub struct Market {
    agent_names: Vec<String>,
    item_names: Vec<String>,
    agents: Vec<AgentId>,
    items: Vec<ItemId>,
    agent_capacities: Vec<usize>,
    item_capacities: Vec<u32>,
    /// `valuations[agent][item]`
    valuations: Vec<Vec<Value>>,
}

impl Market {
    pub fn from_spec(spec: &MarketSpec) -> Result<Self, MarketError> {
        if spec.valuations.is_empty() {
            return Err(MarketError::NoAgents);
        }

        let mut item_set: BTreeSet<&str> = BTreeSet::new();
        if let Capacities::PerName(caps) = &spec.item_capacities {
            item_set.extend(caps.keys().map(String::as_str));
        }
        for values in spec.valuations.values() {
            item_set.extend(values.keys().map(String::as_str));
        }
        if item_set.is_empty() {
            return Err(MarketError::NoItems);
        }

        let item_names: Vec<String> = item_set.iter().map(|s| s.to_string()).collect();
        let item_index: BTreeMap<&str, usize> = item_set
            .iter()
            .enumerate()
            .map(|(idx, &name)| (name, idx))
            .collect();

        let item_capacities = item_names
            .iter()
            .map(|name| {
                spec.item_capacities
                    .lookup(name)
                    .ok_or_else(|| MarketError::MissingItemCapacity(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut agent_names = Vec::with_capacity(spec.valuations.len());
        let mut agent_capacities = Vec::with_capacity(spec.valuations.len());
        let mut valuations = Vec::with_capacity(spec.valuations.len());

        for (agent, values) in &spec.valuations {
            let capacity = spec
                .agent_capacities
                .lookup(agent)
                .ok_or_else(|| MarketError::MissingAgentCapacity(agent.clone()))?;

            let mut row = vec![0.0; item_names.len()];
            for (item, &value) in values {
                let idx = *item_index.get(item.as_str()).ok_or_else(|| MarketError::UnknownItem {
                    agent: agent.clone(),
                    item: item.clone(),
                })?;
                if !value.is_finite() || value < 0.0 {
                    return Err(MarketError::InvalidValuation {
                        agent: agent.clone(),
                        item: item.clone(),
                        value,
                    });
                }
                row[idx] = value;
            }

            agent_names.push(agent.clone());
            agent_capacities.push(capacity as usize);
            valuations.push(row);
        }

        Ok(Self {
            agents: (0..agent_names.len() as u32).map(AgentId).collect(),
            items: (0..item_names.len() as u32).map(ItemId).collect(),
            agent_names,
            item_names,
            agent_capacities,
            item_capacities,
            valuations,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, MarketError> {
        let spec: MarketSpec =
            serde_json::from_str(json).map_err(|e| MarketError::Json(e.to_string()))?;
        Self::from_spec(&spec)
    }

    // === Name lookup ===

    pub fn agent_id(&self, name: &str) -> Option<AgentId> {
        self.agent_names
            .iter()
            .position(|n| n == name)
            .map(|idx| AgentId(idx as u32))
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_names
            .iter()
            .position(|n| n == name)
            .map(|idx| ItemId(idx as u32))
    }

    pub fn agent_name(&self, agent: AgentId) -> &str {
        self.agent_names
            .get(agent.index())
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn item_name(&self, item: ItemId) -> &str {
        self.item_names
            .get(item.index())
            .map(String::as_str)
            .unwrap_or("?")
    }

    /// Bundle from item names; `None` if a name is unknown.
    pub fn bundle(&self, names: &[&str]) -> Option<Bundle> {
        names
            .iter()
            .map(|name| self.item_id(name))
            .collect::<Option<Vec<_>>>()
            .map(Bundle::new)
    }

    pub fn budgets_from_names(&self, budgets: &BTreeMap<String, f64>) -> Result<Budgets, MarketError> {
        budgets
            .iter()
            .map(|(name, &budget)| {
                self.agent_id(name)
                    .map(|agent| (agent, budget))
                    .ok_or_else(|| MarketError::UnknownAgent(name.clone()))
            })
            .collect()
    }

    pub fn name_allocation(&self, allocation: &Allocation) -> BTreeMap<String, Vec<String>> {
        allocation
            .iter()
            .map(|(&agent, bundle)| {
                (
                    self.agent_name(agent).to_string(),
                    bundle
                        .items()
                        .iter()
                        .map(|&item| self.item_name(item).to_string())
                        .collect(),
                )
            })
            .collect()
    }

    pub fn name_prices(&self, prices: &PriceVector) -> BTreeMap<String, f64> {
        self.items
            .iter()
            .map(|&item| (self.item_name(item).to_string(), prices.get(item)))
            .collect()
    }

    pub fn name_budgets(&self, budgets: &Budgets) -> BTreeMap<String, f64> {
        budgets
            .iter()
            .map(|(agent, budget)| (self.agent_name(agent).to_string(), budget))
            .collect()
    }
}

impl Instance for Market {
    fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    fn items(&self) -> &[ItemId] {
        &self.items
    }

    fn agent_capacity(&self, agent: AgentId) -> usize {
        self.agent_capacities.get(agent.index()).copied().unwrap_or(0)
    }

    fn item_capacity(&self, item: ItemId) -> u32 {
        self.item_capacities.get(item.index()).copied().unwrap_or(0)
    }

    fn agent_item_value(&self, agent: AgentId, item: ItemId) -> Value {
        self.valuations
            .get(agent.index())
            .and_then(|row| row.get(item.index()))
            .copied()
            .unwrap_or(0.0)
    }
}
