// Tabu search: visited price regions, neighbor generation and the driver loop.

pub mod equivalence;
pub mod neighbors;
pub mod search;

pub use equivalence::{Comparison, Constraint, ConstraintSet, TabuHistory, find_all_equivalent_prices};
pub use neighbors::{
    AdjustmentRules, Neighborhood, find_all_neighbors, gradient_neighbors, individual_adjustment_neighbors,
    loses_single_claim,
};
pub use search::{TabuReport, TabuSearch, Termination};
