// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::TickSchedule;

/// Longest run, in `queued_time_scale_secs` units, for which the age weight
/// `exp(age / scale)` of a backlog entry stays far below `f64::MAX`.
const MAX_BACKLOG_AGE_SCALES: f64 = 600.0;

/// Every knob of a run. Time-like values are seconds.
///
/// Deserializes from TOML with any subset of fields; missing ones take the
/// [`Default`] values. Call [`validate`](Self::validate) (or go through
/// [`from_toml_str`](Self::from_toml_str)) before handing it to a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub timeframe_secs: f64,
    pub tick_secs: f64,

    // Global token bucket.
    pub rate_per_sec: f64,
    pub initial_burst: f64,
    pub max_burst: f64,

    // Local bucket refill policy.
    pub target_refill_period_secs: f64,
    pub min_refill_amount: f64,
    pub max_refill_amount: f64,
    /// Refill once the balance drops to this fraction of the last refill.
    pub refill_fraction: f64,
    /// Only refill when the current drip ends within this window.
    pub pre_request_time_secs: f64,
    /// Per-second decay factor of the demand EWMA.
    pub ewma_factor: f64,
    /// Backlog entries are weighted by `exp(age / queued_time_scale_secs)`.
    /// Must be at least `timeframe_secs / 600`.
    pub queued_time_scale_secs: f64,

    // Tuning constants.
    /// Amount asked for by a node's very first refill.
    pub initial_refill_amount: f64,
    /// Lowest available global rate while paying down debt, as a fraction
    /// of `rate_per_sec`.
    pub debt_rate_floor: f64,
    /// Lowest per-node rate (tokens/second) handed out by the global bucket.
    pub min_allowed_rate: f64,
    /// Baseline share so a node never reports zero.
    pub min_share: f64,
    /// Multiplier on the age-weighted backlog when computing a share.
    pub backlog_share_weight: f64,

    // Misc.
    /// Exponential smoothing alpha for charted series, if any.
    pub smoothing: Option<f64>,
    /// Base seed for noise terms.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timeframe_secs: 60.0,
            tick_secs: 0.01,
            rate_per_sec: 240.0,
            initial_burst: 100.0,
            max_burst: 100.0,
            target_refill_period_secs: 10.0,
            min_refill_amount: 100.0,
            max_refill_amount: 10_000.0,
            refill_fraction: 0.1,
            pre_request_time_secs: 1.0,
            ewma_factor: 0.5,
            queued_time_scale_secs: 10.0,
            initial_refill_amount: 1000.0,
            debt_rate_floor: 0.01,
            min_allowed_rate: 0.001,
            min_share: 1e-10,
            backlog_share_weight: 1e-2,
            smoothing: None,
            seed: 0,
        }
    }
}

fn positive(field: &'static str, v: f64) -> Result<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(SimError::config(field, format!("must be a positive duration, got {v}")));
    }
    Ok(())
}

fn non_negative(field: &'static str, v: f64) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(SimError::config(field, format!("must be finite and >= 0, got {v}")));
    }
    Ok(())
}

fn unit_interval(field: &'static str, v: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(SimError::config(field, format!("must be within [0, 1], got {v}")));
    }
    Ok(())
}

impl SimConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let cfg: SimConfig = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject anything that would make the run meaningless, before any tick.
    pub fn validate(&self) -> Result<()> {
        positive("timeframe_secs", self.timeframe_secs)?;
        positive("tick_secs", self.tick_secs)?;
        positive("target_refill_period_secs", self.target_refill_period_secs)?;
        positive("pre_request_time_secs", self.pre_request_time_secs)?;
        positive("queued_time_scale_secs", self.queued_time_scale_secs)?;
        if self.tick_secs > self.timeframe_secs {
            return Err(SimError::config("tick_secs", "longer than timeframe_secs"));
        }
        if self.timeframe_secs / self.queued_time_scale_secs > MAX_BACKLOG_AGE_SCALES {
            return Err(SimError::config(
                "queued_time_scale_secs",
                format!(
                    "backlog age weights overflow: timeframe_secs {} exceeds {} scales of {}",
                    self.timeframe_secs, MAX_BACKLOG_AGE_SCALES, self.queued_time_scale_secs
                ),
            ));
        }
        if self.target_refill_period_secs < self.tick_secs {
            return Err(SimError::config(
                "target_refill_period_secs",
                "shorter than one tick",
            ));
        }

        non_negative("rate_per_sec", self.rate_per_sec)?;
        non_negative("initial_burst", self.initial_burst)?;
        non_negative("max_burst", self.max_burst)?;
        non_negative("min_refill_amount", self.min_refill_amount)?;
        non_negative("max_refill_amount", self.max_refill_amount)?;
        non_negative("initial_refill_amount", self.initial_refill_amount)?;
        non_negative("backlog_share_weight", self.backlog_share_weight)?;
        if self.min_refill_amount > self.max_refill_amount {
            return Err(SimError::config(
                "min_refill_amount",
                "larger than max_refill_amount",
            ));
        }
        if !self.min_allowed_rate.is_finite() || self.min_allowed_rate <= 0.0 {
            return Err(SimError::config("min_allowed_rate", "must be > 0"));
        }
        if !self.min_share.is_finite() || self.min_share <= 0.0 {
            return Err(SimError::config("min_share", "must be > 0"));
        }

        unit_interval("refill_fraction", self.refill_fraction)?;
        unit_interval("debt_rate_floor", self.debt_rate_floor)?;
        if !(self.ewma_factor > 0.0 && self.ewma_factor < 1.0) {
            return Err(SimError::config(
                "ewma_factor",
                format!("must be within (0, 1), got {}", self.ewma_factor),
            ));
        }
        if let Some(alpha) = self.smoothing {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(SimError::config(
                    "smoothing",
                    format!("must be within (0, 1], got {alpha}"),
                ));
            }
        }
        Ok(())
    }

    pub fn schedule(&self) -> TickSchedule {
        TickSchedule::new(self.timeframe_secs, self.tick_secs)
    }

    pub fn num_ticks(&self) -> usize {
        self.schedule().num_ticks
    }

    /// Global refill per tick.
    pub fn rate_per_tick(&self) -> f64 {
        self.rate_per_sec * self.tick_secs
    }

    /// Longest drip the global bucket will schedule, in ticks.
    pub fn target_refill_ticks(&self) -> usize {
        self.schedule().tick_for_time(self.target_refill_period_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
