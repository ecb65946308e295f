//! Price search for course allocation: approximate competitive equilibrium
//! from equal incomes (A-CEEI) via tabu search over price vectors, and the
//! gradient budget-perturbation loop (ACEEI).
//!
//! Both drivers read a market through [`Instance`] and hand their final
//! allocation to an [`AllocationSink`] item by item.

pub mod aceei;
pub mod config;
pub mod demand;
pub mod error;
pub mod instance;
pub mod pool;
pub mod sink;
pub mod tabu;
pub mod trace;
pub mod types;
pub mod wasm;

pub use aceei::{AceeiReport, AceeiSearch, BudgetSolver, ExhaustiveBudgetSolver, TieBreak};
pub use config::{AceeiConfig, TabuConfig};
pub use error::{AllocationError, MarketError, SearchError};
pub use instance::{Capacities, Instance, Market, MarketSpec};
pub use pool::WorkerPool;
pub use sink::{AllocationBuilder, AllocationSink, CommitSummary, commit_allocation};
pub use tabu::{TabuReport, TabuSearch, Termination};
pub use trace::SearchTrace;
pub use types::*;
pub use wasm::{AllocationSession, SessionSpec, SolveResponse};

#[cfg(feature = "instrument")]
pub use instrument;
