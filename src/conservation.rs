// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Conservation Logic

use serde::{Deserialize, Serialize};

use crate::simulation::{AllocationOutcome, Simulation};
use crate::types::RateSeries;

/// Relative tolerance for floating-point accumulation.
const TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Per-node grant conservation
// ---------------------------------------------------------------------------

/// Demand still unserved at the end of the run (requested minus granted).
///
/// Never negative for a sound allocator; the size says how far behind the
/// node ended up.
pub fn unserved(requested: &RateSeries, granted: &RateSeries) -> f64 {
    requested.total() - granted.total()
}

/// Outcome of checking one node's grant series against its demand.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConservationResult {
    /// Cumulative granted never exceeded cumulative requested.
    pub balanced: bool,
    /// Largest amount by which cumulative granted overtook requested (0 if none).
    pub error: f64,
    /// First tick at which the prefix check failed.
    pub first_violation: Option<usize>,
}

/// Check `sum(granted[..=t]) <= sum(requested[..=t])` for every prefix `t`.
pub fn verify_node(requested: &RateSeries, granted: &RateSeries) -> ConservationResult {
    let mut cum_req = 0.0;
    let mut cum_granted = 0.0;
    let mut error: f64 = 0.0;
    let mut first_violation = None;
    for (t, (r, g)) in requested.iter().zip(granted.iter()).enumerate() {
        cum_req += r;
        cum_granted += g;
        let excess = cum_granted - cum_req;
        if excess > TOLERANCE * cum_req.max(1.0) {
            error = error.max(excess);
            first_violation.get_or_insert(t);
        }
    }
    ConservationResult {
        balanced: first_violation.is_none(),
        error,
        first_violation,
    }
}

// ---------------------------------------------------------------------------
// Global cap
// ---------------------------------------------------------------------------

/// Non-negative token levels above `max_burst`.
///
/// An initial burst larger than `max_burst` is allowed to drain first, so
/// ticks are only counted once the level has dropped to the cap at least once.
pub fn cap_breaches(tokens: &RateSeries, max_burst: f64) -> u32 {
    let mut settled = false;
    let mut breaches = 0;
    for &level in tokens.iter() {
        if level <= max_burst + TOLERANCE {
            settled = true;
            continue;
        }
        if settled && level >= 0.0 {
            breaches += 1;
        }
    }
    breaches
}

// ---------------------------------------------------------------------------
// Audit of a whole outcome
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Audit {
    pub nodes: Vec<ConservationResult>,
    pub cap_breaches: u32,
    /// Deepest global debt seen (0 when tokens never went negative).
    pub max_debt: f64,
}

impl Audit {
    pub fn holds(&self) -> bool {
        self.cap_breaches == 0 && self.nodes.iter().all(|n| n.balanced)
    }

    /// Largest per-node conservation error.
    pub fn max_error(&self) -> f64 {
        self.nodes.iter().map(|n| n.error).fold(0.0, f64::max)
    }
}

/// Check an outcome produced from `sim`'s demand.
pub fn audit(sim: &Simulation, outcome: &AllocationOutcome) -> Audit {
    let nodes = sim
        .demand()
        .iter()
        .zip(outcome.granted.iter())
        .map(|(r, g)| verify_node(r, g))
        .collect();
    Audit {
        nodes,
        cap_breaches: cap_breaches(&outcome.tokens, sim.config().max_burst),
        max_debt: (-outcome.tokens.min()).max(0.0),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
