use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the counters, shaped for `GET /metrics`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_handoffs: u64,
    pub total_escalates: u64,
    pub requests_by_agent: BTreeMap<String, u64>,
}

/// Process-wide operational counters. Lives as long as the application context.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<MetricsSnapshot>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_request(&self, agent: &str) {
        let mut counters = self.lock();
        counters.total_requests += 1;
        *counters.requests_by_agent.entry(agent.to_string()).or_insert(0) += 1;
    }

    pub fn inc_handoff(&self) {
        self.lock().total_handoffs += 1;
    }

    pub fn inc_escalate(&self) {
        self.lock().total_escalates += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
