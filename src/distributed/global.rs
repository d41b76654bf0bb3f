// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Global Bucket

//! Authoritative token pool of the two-tier algorithm.
//!
//! Local buckets ask for an amount and get back a *schedule*: the granted
//! amount plus a deadline tick by which it must have been dripped in. When the
//! pool is short, the remainder is promised at the caller's fair share of the
//! global rate and the pool goes into debt.

use tracing::trace;

use crate::config::SimConfig;
use crate::error::{Result, SimError};

/// Outcome of one refill request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grant {
    /// Tokens handed out (already debited from the pool).
    pub amount: f64,
    /// Last tick of the drip; equal to the request tick for an immediate grant.
    pub deadline: usize,
}

#[derive(Debug, Clone)]
pub struct GlobalBucket {
    tokens: f64,
    shares_sum: f64,
    last_tick: Option<usize>,

    rate_per_sec: f64,
    rate_per_tick: f64,
    tick_secs: f64,
    max_burst: f64,
    target_refill_period_secs: f64,
    target_refill_ticks: usize,
    debt_rate_floor: f64,
    min_allowed_rate: f64,
}

impl GlobalBucket {
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            tokens: cfg.initial_burst,
            shares_sum: 0.0,
            last_tick: None,
            rate_per_sec: cfg.rate_per_sec,
            rate_per_tick: cfg.rate_per_tick(),
            tick_secs: cfg.tick_secs,
            max_burst: cfg.max_burst,
            target_refill_period_secs: cfg.target_refill_period_secs,
            target_refill_ticks: cfg.target_refill_ticks(),
            debt_rate_floor: cfg.debt_rate_floor,
            min_allowed_rate: cfg.min_allowed_rate,
        }
    }

    /// Current fill level; negative means debt.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn shares_sum(&self) -> f64 {
        self.shares_sum
    }

    /// Refill for tick `now`. Idempotent within a tick.
    pub fn tick(&mut self, now: usize) {
        if self.last_tick == Some(now) {
            return;
        }
        self.last_tick = Some(now);
        // Above MaxBurst only while an oversized initial burst is still in use.
        if self.tokens < self.max_burst {
            self.tokens = (self.tokens + self.rate_per_tick).min(self.max_burst);
        }
        trace!(tick = now, tokens = self.tokens, "global refill");
    }

    /// Global rate left for new grants after amortising debt beyond one
    /// target refill period, floored at `debt_rate_floor × rate`.
    fn available_rate(&self) -> f64 {
        let mut rate = self.rate_per_sec;
        if self.tokens < 0.0 {
            // Up to one period of debt is the expected pre-distribution; any
            // more is systematic error paid back over the next period.
            let excess = -self.tokens - self.target_refill_period_secs * self.rate_per_sec;
            if excess > 0.0 {
                rate -= excess / self.target_refill_period_secs;
                rate = rate.max(self.debt_rate_floor * self.rate_per_sec);
            }
        }
        rate
    }

    /// Serve a refill request of `amount` tokens from a node whose share
    /// changes from `prev_share` to `share`.
    pub fn request(
        &mut self,
        now: usize,
        prev_share: f64,
        share: f64,
        amount: f64,
    ) -> Result<Grant> {
        if !(amount >= 0.0) {
            return Err(SimError::Invariant(format!(
                "refill request for {amount} tokens at tick {now}"
            )));
        }
        let shares_sum = self.shares_sum + (share - prev_share);
        if !share.is_finite() || !shares_sum.is_finite() {
            return Err(SimError::Invariant(format!(
                "share {share} (sum {shares_sum}) at tick {now}"
            )));
        }
        self.shares_sum = shares_sum;

        if self.tokens >= amount {
            self.tokens -= amount;
            return Ok(Grant { amount, deadline: now });
        }

        let mut granted = 0.0;
        let mut remaining = amount;
        if self.tokens > 0.0 {
            granted = self.tokens;
            remaining -= self.tokens;
        }

        let fair_rate = if self.shares_sum > 0.0 {
            self.available_rate() * share / self.shares_sum
        } else {
            self.available_rate()
        };
        let per_tick = fair_rate.max(self.min_allowed_rate) * self.tick_secs;

        let ticks = (remaining / per_tick).round() as usize;
        let deadline = if ticks <= self.target_refill_ticks {
            granted += remaining;
            now + ticks
        } else {
            // Never plan further ahead than one target refill period.
            granted += per_tick * self.target_refill_ticks as f64;
            now + self.target_refill_ticks
        };

        self.tokens -= granted;
        Ok(Grant { amount: granted, deadline })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
