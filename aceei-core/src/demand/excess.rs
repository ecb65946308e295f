// Excess demand and clearing error

use crate::instance::Instance;
use crate::types::{Allocation, ExcessDemand, PriceVector};

/// Seats claimed minus capacity, per item.
///
/// ```
/// use aceei_core::demand::excess_demand;
/// use aceei_core::{Allocation, Market};
///
/// let market = Market::from_json(r#"{
///     "valuations": {"ami": {"x": 3, "y": 4, "z": 2}, "tami": {"x": 4, "y": 3, "z": 2}},
///     "agent_capacities": 2,
///     "item_capacities": {"x": 2, "y": 1, "z": 3}
/// }"#).unwrap();
///
/// let mut allocation = Allocation::new();
/// for agent in ["ami", "tami"] {
///     allocation.insert(market.agent_id(agent).unwrap(), market.bundle(&["x", "y"]).unwrap());
/// }
/// assert_eq!(excess_demand(&market, &allocation).as_slice(), &[0, 1, -3]);
/// ```
pub fn excess_demand(instance: &dyn Instance, allocation: &Allocation) -> ExcessDemand {
    let mut excess: Vec<i64> = instance
        .items()
        .iter()
        .map(|&item| -(instance.item_capacity(item) as i64))
        .collect();

    for bundle in allocation.values() {
        for item in bundle.items() {
            if let Some(slot) = excess.get_mut(item.index()) {
                *slot += 1;
            }
        }
    }

    ExcessDemand::from_vec(excess)
}

/// Like [`excess_demand`], but unsold seats of free items do not count.
pub fn clipped_excess_demand(
    instance: &dyn Instance,
    prices: &PriceVector,
    allocation: &Allocation,
) -> ExcessDemand {
    let raw = excess_demand(instance, allocation);
    ExcessDemand::from_vec(
        raw.iter()
            .map(|(item, z)| if prices.is_free(item) { z.max(0) } else { z })
            .collect(),
    )
}

/// Candidate with the smallest clipped clearing error; the first one wins on
/// ties. `None` only for an empty candidate list.
pub fn min_excess_demand_allocation<'a>(
    instance: &dyn Instance,
    prices: &PriceVector,
    candidates: &'a [Allocation],
) -> Option<(&'a Allocation, ExcessDemand)> {
    let mut best: Option<(&Allocation, ExcessDemand, f64)> = None;
    for allocation in candidates {
        let excess = clipped_excess_demand(instance, prices, allocation);
        let norm = excess.norm();
        match &best {
            Some((_, _, best_norm)) if norm >= *best_norm => {}
            _ => best = Some((allocation, excess, norm)),
        }
    }
    best.map(|(allocation, excess, _)| (allocation, excess))
}
