// Observability context handed to the drivers.
//
// Events use table-shaped targets so the `instrument` subscriber can turn each
// target into one column table (one row per event).

use crate::error::AllocationError;
use crate::types::{AgentId, ItemId, PriceVector};

/// Explicit logging context for one search run. Drivers only emit events
/// from their own thread, never from pool workers.
#[derive(Clone, Debug)]
pub struct SearchTrace {
    run_id: u64,
    enabled: bool,
}

impl Default for SearchTrace {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SearchTrace {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            run_id: 0,
            enabled: false,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[allow(unused_variables)]
    pub fn aceei_iteration(&self, iteration: u32, clearing_error: f64, prices: &PriceVector) {
        if !self.enabled {
            return;
        }
        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "aceei_iteration",
            run_id = self.run_id,
            iteration = iteration,
            clearing_error = clearing_error,
            prices = ?prices.as_slice(),
        );
    }

    #[allow(unused_variables)]
    pub fn tabu_iteration(&self, iteration: u32, norm: f64, best_norm: f64, history_len: usize) {
        if !self.enabled {
            return;
        }
        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "tabu_iteration",
            run_id = self.run_id,
            iteration = iteration,
            norm = norm,
            best_norm = best_norm,
            history_len = history_len as u64,
        );
    }

    #[allow(unused_variables)]
    pub fn tabu_neighbors(&self, iteration: u32, gradient: usize, adjustment: usize) {
        if !self.enabled {
            return;
        }
        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "tabu_neighbors",
            run_id = self.run_id,
            iteration = iteration,
            gradient = gradient as u64,
            adjustment = adjustment as u64,
        );
    }

    #[allow(unused_variables)]
    pub fn infeasible_agent(&self, agent: AgentId) {
        if !self.enabled {
            return;
        }
        #[cfg(feature = "instrument")]
        tracing::debug!(
            target: "infeasible_agent",
            run_id = self.run_id,
            agent_id = agent.0,
        );
    }

    #[allow(unused_variables)]
    pub fn terminated(&self, driver: &'static str, reason: &'static str, iterations: u32, norm: f64) {
        if !self.enabled {
            return;
        }
        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "termination",
            run_id = self.run_id,
            driver = driver,
            reason = reason,
            iterations = iterations,
            norm = norm,
        );
    }

    #[allow(unused_variables)]
    pub fn commit_skipped(&self, agent: AgentId, item: ItemId, err: &AllocationError) {
        if !self.enabled {
            return;
        }
        #[cfg(feature = "instrument")]
        tracing::warn!(
            target: "commit",
            run_id = self.run_id,
            agent_id = agent.0,
            item_id = item.0,
            skipped = true,
            reason = %err,
        );
    }
}
