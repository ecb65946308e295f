use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// === TOLERANCES ===

/// Clearing errors at or below this are treated as exact market clearing.
pub const NORM_TOLERANCE: f64 = 1e-8;

/// A price at or below this is treated as free (clipped excess demand).
pub const PRICE_EPSILON: f64 = 1e-12;

/// Two bundle values closer than this are ties.
pub const VALUE_EPSILON: f64 = 1e-9;

// === TYPE ALIASES ===

pub type Price = f64;
pub type Budget = f64;
pub type Value = f64;

// === NEWTYPE IDS ===

/// Interned agent identifier. Ids are dense (`0..num_agents`) and follow the
/// lexicographic order of the agent names they were interned from.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned item identifier, dense and name-ordered like [`AgentId`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl ItemId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// === BUNDLE ===

/// A set of distinct items, kept sorted so equal sets compare equal.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Bundle(Vec<ItemId>);

impl Bundle {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn new(items: impl IntoIterator<Item = ItemId>) -> Self {
        let mut items: Vec<ItemId> = items.into_iter().collect();
        items.sort_unstable();
        items.dedup();
        Self(items)
    }

    pub fn items(&self) -> &[ItemId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.0.binary_search(&item).is_ok()
    }

    pub fn price(&self, prices: &PriceVector) -> Price {
        prices.bundle_price(&self.0)
    }
}

impl From<Vec<ItemId>> for Bundle {
    fn from(items: Vec<ItemId>) -> Self {
        Self::new(items)
    }
}

// === PRICE VECTOR ===

/// Non-negative price per item, indexed by [`ItemId`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceVector(Vec<Price>);

impl PriceVector {
    pub fn zeros(num_items: usize) -> Self {
        Self(vec![0.0; num_items])
    }

    /// Negative inputs are clamped to zero.
    pub fn from_vec(prices: Vec<Price>) -> Self {
        Self(prices.into_iter().map(|p| p.max(0.0)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, item: ItemId) -> Price {
        self.0.get(item.index()).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, item: ItemId, price: Price) {
        if let Some(slot) = self.0.get_mut(item.index()) {
            *slot = price.max(0.0);
        }
    }

    pub fn is_free(&self, item: ItemId) -> bool {
        self.get(item) <= PRICE_EPSILON
    }

    pub fn bundle_price(&self, items: &[ItemId]) -> Price {
        items.iter().map(|&item| self.get(item)).sum()
    }

    pub fn as_slice(&self) -> &[Price] {
        &self.0
    }

    /// `p + step * z`, clamped at zero, for every item.
    pub fn stepped(&self, step: f64, excess: &ExcessDemand) -> Self {
        Self(
            self.0
                .iter()
                .enumerate()
                .map(|(idx, &price)| {
                    let z = excess.get(ItemId(idx as u32)) as f64;
                    (price + step * z).max(0.0)
                })
                .collect(),
        )
    }
}

// === EXCESS DEMAND ===

/// Signed excess demand per item, indexed by [`ItemId`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcessDemand(Vec<i64>);

impl ExcessDemand {
    pub fn from_vec(values: Vec<i64>) -> Self {
        Self(values)
    }

    pub fn get(&self, item: ItemId) -> i64 {
        self.0.get(item.index()).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// L2 norm, i.e. the clearing error.
    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|&z| (z as f64) * (z as f64))
            .sum::<f64>()
            .sqrt()
    }

    pub fn is_cleared(&self) -> bool {
        self.norm() <= NORM_TOLERANCE
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, i64)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(idx, &z)| (ItemId(idx as u32), z))
    }
}

// === ALLOCATION & BUDGETS ===

pub type Allocation = BTreeMap<AgentId, Bundle>;

/// Per-agent budgets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Budgets(BTreeMap<AgentId, Budget>);

impl Budgets {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, agent: AgentId, budget: Budget) {
        self.0.insert(agent, budget);
    }

    pub fn get(&self, agent: AgentId) -> Option<Budget> {
        self.0.get(&agent).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, Budget)> + '_ {
        self.0.iter().map(|(&agent, &budget)| (agent, budget))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(AgentId, Budget)> for Budgets {
    fn from_iter<T: IntoIterator<Item = (AgentId, Budget)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// True when every agent can afford its bundle.
pub fn is_valid_allocation(allocation: &Allocation, prices: &PriceVector, budgets: &Budgets) -> bool {
    allocation.iter().all(|(&agent, bundle)| match budgets.get(agent) {
        Some(budget) => bundle.price(prices) <= budget,
        None => false,
    })
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}
