// ACEEI: gradient price updates with per-agent budget perturbation.

pub mod budget_solver;
pub mod driver;

pub use budget_solver::{
    BudgetChoice, BudgetPerturbation, BudgetSolver, ExhaustiveBudgetSolver, TieBreak, respects_tie_break,
};
pub use driver::{AceeiReport, AceeiSearch};
