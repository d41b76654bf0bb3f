// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Type Definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

// ─── Tick Schedule ───────────────────────────────────────────────────────────

/// Fixed-duration discrete time axis shared by every series of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickSchedule {
    /// Duration of one tick in seconds.
    pub tick_secs: f64,
    /// Number of ticks in the horizon.
    pub num_ticks: usize,
}

impl TickSchedule {
    /// `floor(timeframe / tick)` ticks. Callers validate both values first.
    pub fn new(timeframe_secs: f64, tick_secs: f64) -> Self {
        // Nudge before flooring so that e.g. 1.0 / 0.01 lands on 100, not 99.
        let num_ticks = (timeframe_secs / tick_secs + 1e-9).floor() as usize;
        Self { tick_secs, num_ticks }
    }

    pub fn time_for_tick(&self, tick: usize) -> f64 {
        tick as f64 * self.tick_secs
    }

    pub fn tick_for_time(&self, secs: f64) -> usize {
        (secs / self.tick_secs + 1e-9).floor().max(0.0) as usize
    }

    /// Elapsed seconds at the start of every tick.
    pub fn time_axis(&self) -> Vec<f64> {
        (0..self.num_ticks).map(|t| self.time_for_tick(t)).collect()
    }
}

// ─── NodeId ──────────────────────────────────────────────────────────────────

/// Position of a node in the fixed per-tick update order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Charts label nodes starting at 1.
        write!(f, "node {}", self.0 + 1)
    }
}

// ─── RateSeries ──────────────────────────────────────────────────────────────

/// One real value per tick.
///
/// Depending on the stage of a run the values are rates (units/second) or
/// absolute per-tick amounts; [`to_amounts`](Self::to_amounts) and
/// [`to_rates`](Self::to_rates) convert between the two.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateSeries(pub Vec<f64>);

impl RateSeries {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.0 {
            *v *= factor;
        }
    }

    /// Rate (units/second) to absolute per-tick amount.
    pub fn to_amounts(&self, schedule: &TickSchedule) -> Self {
        let mut out = self.clone();
        out.scale(schedule.tick_secs);
        out
    }

    /// Absolute per-tick amount back to a rate.
    pub fn to_rates(&self, schedule: &TickSchedule) -> Self {
        let mut out = self.clone();
        out.scale(1.0 / schedule.tick_secs);
        out
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Running sums: `out[t] = self[0] + ... + self[t]`.
    pub fn cumulative(&self) -> Self {
        let mut acc = 0.0;
        Self(
            self.0
                .iter()
                .map(|v| {
                    acc += v;
                    acc
                })
                .collect(),
        )
    }

    pub fn min(&self) -> f64 {
        self.0.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.0.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Exponential smoothing; `alpha` in (0,1], 1 meaning no smoothing.
    pub fn smooth(&self, alpha: f64) -> Self {
        let mut out = Vec::with_capacity(self.0.len());
        for (i, &v) in self.0.iter().enumerate() {
            if i == 0 {
                out.push(v);
            } else {
                out.push((1.0 - alpha) * out[i - 1] + alpha * v);
            }
        }
        Self(out)
    }

    /// Element-wise sum of equally long series.
    pub fn sum_of(series: &[RateSeries], len: usize) -> Self {
        let mut out = Self::zeros(len);
        for s in series {
            for (o, v) in out.0.iter_mut().zip(s.iter()) {
                *o += v;
            }
        }
        out
    }
}

impl From<Vec<f64>> for RateSeries {
    fn from(v: Vec<f64>) -> Self {
        Self(v)
    }
}

impl Index<usize> for RateSeries {
    type Output = f64;
    fn index(&self, tick: usize) -> &f64 {
        &self.0[tick]
    }
}

impl IndexMut<usize> for RateSeries {
    fn index_mut(&mut self, tick: usize) -> &mut f64 {
        &mut self.0[tick]
    }
}
