use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

use crate::aceei::{AceeiReport, AceeiSearch, ExhaustiveBudgetSolver};
use crate::config::{AceeiConfig, TabuConfig};
use crate::error::{MarketError, SearchError};
use crate::instance::{Market, MarketSpec};
use crate::sink::AllocationBuilder;
use crate::tabu::{TabuReport, TabuSearch};
use crate::trace::SearchTrace;
use crate::types::{AgentId, Budgets};

// ============================================================================
// Boundary types
// ============================================================================

/// Market plus named initial budgets.
#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SessionSpec {
    pub market: MarketSpec,
    pub budgets: BTreeMap<String, f64>,
}

/// Named result of one search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct SolveResponse {
    pub allocation: BTreeMap<String, Vec<String>>,
    pub prices: BTreeMap<String, f64>,
    pub budgets: BTreeMap<String, f64>,
    pub clearing_error: f64,
    pub iterations: u32,
    /// `cleared`, `stuck` or `iteration_limit`.
    pub termination: String,
    pub infeasible_agents: Vec<String>,
    /// Items the commit pass could not hand out.
    pub skipped_items: usize,
}

// ============================================================================
// WASM API - Allocation session
// ============================================================================

#[wasm_bindgen]
pub struct AllocationSession {
    market: Market,
    budgets: Budgets,
    runs: u64,
}

#[wasm_bindgen]
impl AllocationSession {
    #[wasm_bindgen(constructor)]
    pub fn new(spec: SessionSpec) -> Result<AllocationSession, JsError> {
        console_error_panic_hook::set_once();
        Ok(Self::from_spec(&spec)?)
    }

    /// Tabu search; `config` is a partial `TabuConfig` object or undefined.
    #[wasm_bindgen]
    pub fn run_tabu(&mut self, config: JsValue) -> Result<SolveResponse, JsError> {
        let config: TabuConfig = parse_config(config)?;
        Ok(self.solve_tabu(config)?)
    }

    /// ACEEI with the exhaustive budget solver; `config` is a partial
    /// `AceeiConfig` object or undefined. Hitting the iteration cap still
    /// returns the best state seen, with nothing committed.
    #[wasm_bindgen]
    pub fn run_aceei(&mut self, config: JsValue) -> Result<SolveResponse, JsError> {
        let config: AceeiConfig = parse_config(config)?;
        Ok(self.solve_aceei(config)?)
    }

    #[wasm_bindgen]
    pub fn agent_names(&self) -> Vec<String> {
        self.market.name_budgets(&self.budgets).into_keys().collect()
    }
}

fn parse_config<T: Default + for<'de> Deserialize<'de>>(value: JsValue) -> Result<T, JsError> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| JsError::new(&e.to_string()))
}

impl AllocationSession {
    pub fn from_spec(spec: &SessionSpec) -> Result<Self, MarketError> {
        let market = Market::from_spec(&spec.market)?;
        let budgets = market.budgets_from_names(&spec.budgets)?;
        Ok(Self {
            market,
            budgets,
            runs: 0,
        })
    }

    fn next_trace(&mut self) -> SearchTrace {
        self.runs += 1;
        SearchTrace::new(self.runs)
    }

    pub fn solve_tabu(&mut self, config: TabuConfig) -> Result<SolveResponse, SearchError> {
        let trace = self.next_trace();
        let mut sink = AllocationBuilder::new(&self.market);
        let report = TabuSearch::new(config).run(&self.market, &self.budgets, &mut sink, &trace)?;
        Ok(self.tabu_response(&report))
    }

    pub fn solve_aceei(&mut self, config: AceeiConfig) -> Result<SolveResponse, SearchError> {
        let trace = self.next_trace();
        let mut sink = AllocationBuilder::new(&self.market);
        match AceeiSearch::new(config).run(
            &self.market,
            &self.budgets,
            &ExhaustiveBudgetSolver,
            &mut sink,
            &trace,
        ) {
            Ok(report) => Ok(self.aceei_response(&report, "cleared")),
            Err(SearchError::NonConvergence { best, .. }) => Ok(self.aceei_response(&best, "iteration_limit")),
            Err(err) => Err(err),
        }
    }

    fn tabu_response(&self, report: &TabuReport) -> SolveResponse {
        SolveResponse {
            allocation: self.market.name_allocation(&report.allocation),
            prices: self.market.name_prices(&report.prices),
            budgets: self.market.name_budgets(&self.budgets),
            clearing_error: report.clearing_error,
            iterations: report.iterations,
            termination: report.termination.as_str().to_string(),
            infeasible_agents: self.agent_names_of(&report.infeasible_agents),
            skipped_items: report.commit.skipped.len(),
        }
    }

    fn aceei_response(&self, report: &AceeiReport, termination: &str) -> SolveResponse {
        SolveResponse {
            allocation: self.market.name_allocation(&report.allocation),
            prices: self.market.name_prices(&report.prices),
            budgets: self.market.name_budgets(&report.budgets),
            clearing_error: report.clearing_error,
            iterations: report.iterations,
            termination: termination.to_string(),
            infeasible_agents: self.agent_names_of(&report.infeasible_agents),
            skipped_items: report.commit.skipped.len(),
        }
    }

    fn agent_names_of(&self, agents: &[AgentId]) -> Vec<String> {
        agents
            .iter()
            .map(|&agent| self.market.agent_name(agent).to_string())
            .collect()
    }
}
