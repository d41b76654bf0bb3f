// Suite Report Types
// Written next to the per-workload charts as summary.json

use serde::Serialize;

use crate::metrics::WorkloadMetrics;

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadResult {
    pub name: String,
    pub label: String,
    pub nodes: usize,
    pub ticks: usize,
    pub requested: f64,
    pub ideal_granted: f64,
    pub distributed_granted: f64,
    pub ideal_unfairness: Option<f64>,
    pub distributed_unfairness: Option<f64>,
    pub min_global_tokens: f64,
    pub max_debt: f64,
    pub refills: u32,
    pub max_conservation_error: f64,
    pub cap_breaches: u32,
    pub conservation_holds: bool,
    pub elapsed_ms: u128,
}

impl WorkloadResult {
    pub fn new(
        name: &str,
        label: &str,
        nodes: usize,
        ticks: usize,
        m: &WorkloadMetrics,
        elapsed_ms: u128,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            nodes,
            ticks,
            requested: m.requested,
            ideal_granted: m.ideal_granted,
            distributed_granted: m.distributed_granted,
            ideal_unfairness: m.ideal_unfairness,
            distributed_unfairness: m.distributed_unfairness,
            min_global_tokens: m.min_global_tokens,
            max_debt: m.distributed_audit.max_debt,
            refills: m.refills,
            max_conservation_error: m.ideal_audit.max_error().max(m.distributed_audit.max_error()),
            cap_breaches: m.ideal_audit.cap_breaches + m.distributed_audit.cap_breaches,
            conservation_holds: m.conservation_holds(),
            elapsed_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct SuiteReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub summary: Summary,
    pub workloads: Vec<WorkloadResult>,
}
