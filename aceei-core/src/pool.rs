use rayon::prelude::*;

use crate::types::AgentId;

/// Fixed-size pool for per-agent work.
///
/// `map_agents` is a parallel-for with a join barrier: it returns only once
/// every agent has been evaluated, with results ordered by agent id
/// regardless of completion order.
pub struct WorkerPool {
    threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    /// `threads == 0` sizes the pool to the available cores.
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            threads
        };
        let pool = if threads > 1 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .ok()
        } else {
            None
        };
        Self { threads, pool }
    }

    pub fn sequential() -> Self {
        Self {
            threads: 1,
            pool: None,
        }
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map(|_| self.threads).unwrap_or(1)
    }

    pub fn map_agents<T, F>(&self, agents: &[AgentId], work: F) -> Vec<(AgentId, T)>
    where
        T: Send,
        F: Fn(AgentId) -> T + Sync,
    {
        let mut results = match &self.pool {
            Some(pool) if agents.len() > 1 => pool.install(|| {
                agents
                    .par_iter()
                    .map(|&agent| (agent, work(agent)))
                    .collect::<Vec<_>>()
            }),
            _ => agents.iter().map(|&agent| (agent, work(agent))).collect(),
        };
        results.sort_by_key(|(agent, _)| *agent);
        results
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(0)
    }
}
