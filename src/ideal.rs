// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Perfect-Knowledge Token Bucket
//
// Single global pool that sees every node's demand at every tick. Serves the
// oldest unsatisfied tick first ("head of queue") and, when that tick cannot
// be fully served, splits the remaining tokens across all nodes queued there
// in proportion to what each one asked for.

use tracing::debug;

use crate::config::SimConfig;
use crate::simulation::AllocationOutcome;
use crate::types::RateSeries;

/// Reference allocator used as the correctness oracle.
#[derive(Debug, Clone)]
pub struct IdealAllocator {
    rate_per_tick: f64,
    max_burst: f64,
    tokens: f64,
}

impl IdealAllocator {
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            rate_per_tick: cfg.rate_per_tick(),
            max_burst: cfg.max_burst,
            tokens: cfg.initial_burst,
        }
    }

    fn refill(&mut self) {
        // Above MaxBurst only while an oversized initial burst is still in use.
        if self.tokens < self.max_burst {
            self.tokens = (self.tokens + self.rate_per_tick).min(self.max_burst);
        }
    }

    /// Allocate per-tick absolute amounts. `requested` is consumed as the
    /// outstanding queue; the result holds granted amounts and the token
    /// level after each tick's refill.
    pub fn allocate(mut self, mut requested: Vec<RateSeries>, num_ticks: usize) -> AllocationOutcome {
        let mut granted = vec![RateSeries::zeros(num_ticks); requested.len()];
        let mut trace = RateSeries::zeros(num_ticks);
        let mut heads = vec![0usize; requested.len()];

        for now in 0..num_ticks {
            self.refill();
            trace[now] = self.tokens;

            while self.tokens > 0.0 {
                let Some(head) = head_of_queue(&requested, &mut heads) else {
                    break;
                };
                if head > now {
                    // Everything up to `now` is already served.
                    break;
                }

                let queued: f64 = heads
                    .iter()
                    .enumerate()
                    .filter(|(_, &h)| h == head)
                    .map(|(i, _)| requested[i][head])
                    .sum();
                let fraction = if queued > self.tokens {
                    let f = self.tokens / queued;
                    self.tokens = 0.0;
                    f
                } else {
                    self.tokens -= queued;
                    1.0
                };

                for (i, &h) in heads.iter().enumerate() {
                    if h != head {
                        continue;
                    }
                    let amount = requested[i][head] * fraction;
                    requested[i][head] -= amount;
                    granted[i][now] += amount;
                }
            }
        }

        debug!(nodes = granted.len(), ticks = num_ticks, "ideal allocation complete");
        AllocationOutcome::new(granted, trace)
    }
}

/// Advance every node's pointer past fully served ticks and return the
/// earliest tick any node still waits on.
fn head_of_queue(requested: &[RateSeries], heads: &mut [usize]) -> Option<usize> {
    let mut min: Option<usize> = None;
    for (series, h) in requested.iter().zip(heads.iter_mut()) {
        while *h < series.len() && series[*h] == 0.0 {
            *h += 1;
        }
        if *h < series.len() {
            min = Some(min.map_or(*h, |m| m.min(*h)));
        }
    }
    min
}
