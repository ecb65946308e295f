use thiserror::Error;

use crate::aceei::AceeiReport;
use crate::types::{AgentId, ItemId};

/// Rejected market specifications.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketError {
    #[error("market has no agents")]
    NoAgents,
    #[error("market has no items")]
    NoItems,
    #[error("no capacity given for item `{0}`")]
    MissingItemCapacity(String),
    #[error("no capacity given for agent `{0}`")]
    MissingAgentCapacity(String),
    #[error("agent `{agent}` values unknown item `{item}`")]
    UnknownItem { agent: String, item: String },
    #[error("agent `{agent}` has invalid valuation {value} for item `{item}`")]
    InvalidValuation {
        agent: String,
        item: String,
        value: f64,
    },
    #[error("unknown agent `{0}`")]
    UnknownAgent(String),
    #[error("malformed market json: {0}")]
    Json(String),
}

/// Reasons a sink refuses a single item.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    #[error("{0} is not part of this market")]
    UnknownAgent(AgentId),
    #[error("{0} is not part of this market")]
    UnknownItem(ItemId),
    #[error("{item} has no remaining capacity")]
    NoRemainingCapacity { item: ItemId },
    #[error("{agent} is already at capacity")]
    AgentAtCapacity { agent: AgentId },
    #[error("{agent} already holds {item}")]
    AlreadyHeld { agent: AgentId, item: ItemId },
}

/// Failures of the price-search drivers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The gradient loop hit its iteration ceiling. Carries the lowest-error
    /// state seen so the caller can still use it.
    #[error("no market-clearing prices after {iterations} iterations (best clearing error {:.4})", .best.clearing_error)]
    NonConvergence {
        iterations: u32,
        best: Box<AceeiReport>,
    },
    #[error("budget solver found no choice satisfying the tie-break constraints at iteration {iteration}")]
    InfeasibleBudgets { iteration: u32 },
    #[error("no initial budget for {agent}")]
    MissingBudget { agent: AgentId },
    #[error("tabu search needs at least one step size")]
    EmptyStepSet,
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
