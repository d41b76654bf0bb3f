// Per-Workload Summary Metrics: totals, fairness and conservation

use distbucket_engine::conservation::{self, Audit};
use distbucket_engine::{AllocationOutcome, Comparison, RateSeries, Simulation};

/// Worst relative gap in cumulative grant between nodes with identical
/// demand. `None` when no two nodes share a demand series.
pub fn worst_unfairness(demand: &[RateSeries], outcome: &AllocationOutcome) -> Option<f64> {
    let mut worst: Option<f64> = None;
    for i in 0..demand.len() {
        // Only the first node of each group collects its peers.
        if demand[..i].iter().any(|d| *d == demand[i]) {
            continue;
        }
        let totals: Vec<f64> = (i..demand.len())
            .filter(|&j| demand[j] == demand[i])
            .map(|j| outcome.granted[j].total())
            .collect();
        if totals.len() < 2 {
            continue;
        }
        let hi = totals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lo = totals.iter().cloned().fold(f64::INFINITY, f64::min);
        let gap = if hi > 0.0 { (hi - lo) / hi } else { 0.0 };
        worst = Some(worst.map_or(gap, |w| w.max(gap)));
    }
    worst
}

pub struct WorkloadMetrics {
    pub requested: f64,
    pub ideal_granted: f64,
    pub distributed_granted: f64,
    pub ideal_unfairness: Option<f64>,
    pub distributed_unfairness: Option<f64>,
    pub min_global_tokens: f64,
    pub refills: u32,
    pub ideal_audit: Audit,
    pub distributed_audit: Audit,
}

impl WorkloadMetrics {
    /// Totals are absolute token amounts.
    pub fn new(sim: &Simulation, comparison: &Comparison) -> Self {
        let tick = sim.schedule().tick_secs;
        let amount = |series: &RateSeries| series.total() * tick;
        Self {
            requested: sim.demand().iter().map(amount).sum(),
            ideal_granted: comparison.ideal.granted.iter().map(amount).sum(),
            distributed_granted: comparison.distributed.granted.iter().map(amount).sum(),
            ideal_unfairness: worst_unfairness(sim.demand(), &comparison.ideal),
            distributed_unfairness: worst_unfairness(sim.demand(), &comparison.distributed),
            min_global_tokens: comparison.distributed.tokens.min(),
            refills: comparison.distributed.refills.iter().sum(),
            ideal_audit: conservation::audit(sim, &comparison.ideal),
            distributed_audit: conservation::audit(sim, &comparison.distributed),
        }
    }

    pub fn conservation_holds(&self) -> bool {
        self.ideal_audit.holds() && self.distributed_audit.holds()
    }
}
