// Allocation sink: where final bundles are committed

use crate::error::AllocationError;
use crate::instance::Instance;
use crate::trace::SearchTrace;
use crate::types::{AgentId, Allocation, Bundle, ItemId};

/// Receives the final allocation.
pub trait AllocationSink {
    fn remaining_item_capacity(&self, item: ItemId) -> u32;

    fn give(&mut self, agent: AgentId, item: ItemId) -> Result<(), AllocationError>;

    /// Gives every item of the bundle, stopping at the first rejection.
    fn give_bundle(&mut self, agent: AgentId, bundle: &Bundle) -> Result<(), AllocationError> {
        for &item in bundle.items() {
            self.give(agent, item)?;
        }
        Ok(())
    }
}

/// Tracks remaining item and agent capacities while bundles are handed out.
#[derive(Clone, Debug)]
pub struct AllocationBuilder {
    remaining_items: Vec<u32>,
    remaining_agents: Vec<usize>,
    bundles: Allocation,
}

impl AllocationBuilder {
    pub fn new(instance: &dyn Instance) -> Self {
        Self {
            remaining_items: instance
                .items()
                .iter()
                .map(|&item| instance.item_capacity(item))
                .collect(),
            remaining_agents: instance
                .agents()
                .iter()
                .map(|&agent| instance.agent_capacity(agent))
                .collect(),
            bundles: instance
                .agents()
                .iter()
                .map(|&agent| (agent, Bundle::empty()))
                .collect(),
        }
    }

    pub fn bundle(&self, agent: AgentId) -> Option<&Bundle> {
        self.bundles.get(&agent)
    }

    pub fn allocation(&self) -> &Allocation {
        &self.bundles
    }

    pub fn into_allocation(self) -> Allocation {
        self.bundles
    }
}

impl AllocationSink for AllocationBuilder {
    fn remaining_item_capacity(&self, item: ItemId) -> u32 {
        self.remaining_items.get(item.index()).copied().unwrap_or(0)
    }

    fn give(&mut self, agent: AgentId, item: ItemId) -> Result<(), AllocationError> {
        let item_left = *self
            .remaining_items
            .get(item.index())
            .ok_or(AllocationError::UnknownItem(item))?;
        let agent_left = *self
            .remaining_agents
            .get(agent.index())
            .ok_or(AllocationError::UnknownAgent(agent))?;
        let held = self
            .bundles
            .get(&agent)
            .ok_or(AllocationError::UnknownAgent(agent))?;

        if held.contains(item) {
            return Err(AllocationError::AlreadyHeld { agent, item });
        }
        if item_left == 0 {
            return Err(AllocationError::NoRemainingCapacity { item });
        }
        if agent_left == 0 {
            return Err(AllocationError::AgentAtCapacity { agent });
        }

        self.remaining_items[item.index()] -= 1;
        self.remaining_agents[agent.index()] -= 1;
        let updated = Bundle::new(held.items().iter().copied().chain(std::iter::once(item)));
        self.bundles.insert(agent, updated);
        Ok(())
    }
}

// === COMMIT ===

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub given: usize,
    pub skipped: Vec<(AgentId, ItemId)>,
}

/// Hands out an allocation item by item. Items the sink rejects (typically no
/// remaining capacity) are skipped and reported; the pass never aborts.
pub fn commit_allocation(
    sink: &mut dyn AllocationSink,
    allocation: &Allocation,
    trace: &SearchTrace,
) -> CommitSummary {
    let mut summary = CommitSummary::default();

    for (&agent, bundle) in allocation {
        for &item in bundle.items() {
            if sink.remaining_item_capacity(item) == 0 {
                trace.commit_skipped(agent, item, &AllocationError::NoRemainingCapacity { item });
                summary.skipped.push((agent, item));
                continue;
            }
            match sink.give(agent, item) {
                Ok(()) => summary.given += 1,
                Err(err) => {
                    trace.commit_skipped(agent, item, &err);
                    summary.skipped.push((agent, item));
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Market, MarketSpec};

    fn market() -> Market {
        let spec: MarketSpec = serde_json::from_str(
            r#"{
                "valuations": {"a": {"x": 1, "y": 1}, "b": {"x": 1, "y": 1}},
                "agent_capacities": 1,
                "item_capacities": {"x": 1, "y": 2}
            }"#,
        )
        .unwrap();
        Market::from_spec(&spec).unwrap()
    }

    #[test]
    fn give_respects_item_and_agent_capacity() {
        let market = market();
        let (a, b) = (market.agent_id("a").unwrap(), market.agent_id("b").unwrap());
        let (x, y) = (market.item_id("x").unwrap(), market.item_id("y").unwrap());
        let mut builder = AllocationBuilder::new(&market);

        assert_eq!(builder.give(a, x), Ok(()));
        assert_eq!(builder.give(b, x), Err(AllocationError::NoRemainingCapacity { item: x }));
        assert_eq!(builder.give(a, y), Err(AllocationError::AgentAtCapacity { agent: a }));
        assert_eq!(builder.remaining_item_capacity(x), 0);
        assert_eq!(builder.remaining_item_capacity(y), 2);
    }

    #[test]
    fn commit_skips_exhausted_items_without_aborting() {
        let market = market();
        let (a, b) = (market.agent_id("a").unwrap(), market.agent_id("b").unwrap());
        let (x, y) = (market.item_id("x").unwrap(), market.item_id("y").unwrap());

        let mut allocation = Allocation::new();
        allocation.insert(a, Bundle::new([x]));
        allocation.insert(b, Bundle::new([x]));

        let mut builder = AllocationBuilder::new(&market);
        builder.give(b, y).unwrap();
        let mut builder_b_full = builder.clone();

        let summary = commit_allocation(&mut builder, &allocation, &SearchTrace::disabled());
        assert_eq!(summary.given, 1);
        assert_eq!(summary.skipped, vec![(b, x)]);
        assert_eq!(builder.bundle(a), Some(&Bundle::new([x])));

        // b already holds y and has capacity 1: x is refused for b but a still gets it
        let summary = commit_allocation(&mut builder_b_full, &allocation, &SearchTrace::disabled());
        assert_eq!(summary.given, 1);
        assert_eq!(builder_b_full.bundle(b), Some(&Bundle::new([y])));
    }
}
