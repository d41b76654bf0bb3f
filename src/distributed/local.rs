// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Local Bucket

//! Per-node token cache.
//!
//! A local bucket serves its node's demand out of a cached balance, fed by a
//! linear drip installed from the last global grant. It decides on its own
//! when to go back to the [`GlobalBucket`] and how much to ask for, using a
//! smoothed estimate of its demand plus whatever backlog it is carrying.

use tracing::debug;

use crate::config::SimConfig;
use crate::distributed::global::{GlobalBucket, Grant};
use crate::error::{Result, SimError};
use crate::types::{NodeId, RateSeries};

/// Refill policy knobs, resolved from [`SimConfig`] once per run.
#[derive(Debug, Clone, Copy)]
pub struct RefillPolicy {
    tick_secs: f64,
    refill_fraction: f64,
    pre_request_time_secs: f64,
    /// Per-tick EWMA decay, `ewma_factor ^ tick_secs`.
    ewma_alpha: f64,
    /// Target refill period expressed in ticks (fractional).
    target_refill_ticks: f64,
    min_refill_amount: f64,
    max_refill_amount: f64,
    initial_refill_amount: f64,
    min_share: f64,
    backlog_share_weight: f64,
    queued_time_scale_secs: f64,
}

impl RefillPolicy {
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            tick_secs: cfg.tick_secs,
            refill_fraction: cfg.refill_fraction,
            pre_request_time_secs: cfg.pre_request_time_secs,
            ewma_alpha: cfg.ewma_factor.powf(cfg.tick_secs),
            target_refill_ticks: cfg.target_refill_period_secs / cfg.tick_secs,
            min_refill_amount: cfg.min_refill_amount,
            max_refill_amount: cfg.max_refill_amount,
            initial_refill_amount: cfg.initial_refill_amount,
            min_share: cfg.min_share,
            backlog_share_weight: cfg.backlog_share_weight,
            queued_time_scale_secs: cfg.queued_time_scale_secs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalBucket {
    id: NodeId,
    policy: RefillPolicy,

    /// Per-tick requested amounts.
    requested: RateSeries,
    /// Unserved part of each tick's request.
    outstanding: RateSeries,
    /// Oldest tick that may still have outstanding demand.
    outstanding_tick: usize,
    granted: RateSeries,

    balance: f64,
    drain_rate: f64,
    deadline: usize,

    demand_ewma: f64,
    last_share: f64,
    last_refill_amount: f64,
    last_refill_tick: usize,
    refills: u32,
}

impl LocalBucket {
    /// `requested` holds absolute per-tick amounts.
    pub fn new(id: NodeId, policy: RefillPolicy, requested: RateSeries) -> Self {
        let len = requested.len();
        Self {
            id,
            policy,
            outstanding: requested.clone(),
            requested,
            outstanding_tick: 0,
            granted: RateSeries::zeros(len),
            balance: 0.0,
            drain_rate: 0.0,
            deadline: 0,
            demand_ewma: 0.0,
            last_share: 0.0,
            last_refill_amount: 0.0,
            last_refill_tick: 0,
            refills: 0,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn drain_rate(&self) -> f64 {
        self.drain_rate
    }

    pub fn deadline(&self) -> usize {
        self.deadline
    }

    /// Refill requests sent to the global bucket so far.
    pub fn refills(&self) -> u32 {
        self.refills
    }

    pub fn granted(&self) -> &RateSeries {
        &self.granted
    }

    pub fn into_granted(self) -> RateSeries {
        self.granted
    }

    /// Undelivered tokens of the current drip as of the start of `now`.
    fn pending_drip(&self, now: usize) -> f64 {
        if self.deadline >= now {
            (self.deadline - now + 1) as f64 * self.drain_rate
        } else {
            0.0
        }
    }

    fn backlog(&self, now: usize) -> f64 {
        (self.outstanding_tick..=now).map(|t| self.outstanding[t]).sum()
    }

    /// Backlog with each entry weighted by `exp(age / queued_time_scale)`,
    /// so long-waiting demand counts for more.
    fn aged_backlog(&self, now: usize) -> f64 {
        (self.outstanding_tick..=now)
            .map(|t| {
                let age_secs = (now - t) as f64 * self.policy.tick_secs;
                self.outstanding[t] * (age_secs / self.policy.queued_time_scale_secs).exp()
            })
            .sum()
    }

    /// Install a grant as the new drip, folding in whatever the previous drip
    /// had not delivered yet.
    fn distribute(&mut self, now: usize, grant: Grant) -> Result<()> {
        if !(grant.amount >= 0.0) {
            return Err(SimError::Invariant(format!(
                "{}: granted {} tokens at tick {}",
                self.id, grant.amount, now
            )));
        }
        self.last_refill_tick = now;
        self.last_refill_amount = grant.amount;

        let total = grant.amount + self.pending_drip(now);
        if grant.deadline <= now {
            // Past or present deadline: deliver everything now, no drip.
            self.balance += total;
            self.drain_rate = 0.0;
            self.deadline = now;
        } else {
            // The drip runs on every tick in now..=deadline.
            self.drain_rate = total / (grant.deadline - now + 1) as f64;
            self.deadline = grant.deadline;
        }
        Ok(())
    }

    /// Decide whether to refill from the global bucket at `now`, and do it.
    pub fn maintain(&mut self, now: usize, global: &mut GlobalBucket) -> Result<()> {
        let p = self.policy;
        if self.balance > self.last_refill_amount * p.refill_fraction {
            return Ok(());
        }
        let until_deadline = (self.deadline as f64 - now as f64) * p.tick_secs;
        if until_deadline > p.pre_request_time_secs {
            return Ok(());
        }

        let backlog = self.backlog(now);
        if self.refills > 0 && self.demand_ewma == 0.0 && backlog == 0.0 {
            // Nothing observed since the bootstrap refill.
            return Ok(());
        }

        self.demand_ewma =
            self.demand_ewma * p.ewma_alpha + self.requested[now] * (1.0 - p.ewma_alpha);

        let amount = if self.refills == 0 {
            p.initial_refill_amount
        } else {
            (self.demand_ewma * p.target_refill_ticks + backlog)
                .clamp(p.min_refill_amount, p.max_refill_amount)
        };

        let share = p.min_share + self.demand_ewma + self.aged_backlog(now) * p.backlog_share_weight;

        let since_last = now - self.last_refill_tick;
        let grant = global.request(now, self.last_share, share, amount)?;
        self.last_share = share;
        self.refills += 1;
        debug!(
            node = %self.id,
            tick = now,
            since_last,
            requested = amount,
            granted = grant.amount,
            deadline = grant.deadline,
            share,
            "refill"
        );
        self.distribute(now, grant)
    }

    /// Advance one tick: maybe refill, drip, then serve the backlog oldest
    /// tick first.
    pub fn tick(&mut self, now: usize, global: &mut GlobalBucket) -> Result<()> {
        self.maintain(now, global)?;
        if self.deadline >= now {
            self.balance += self.drain_rate;
        }

        while self.outstanding_tick <= now {
            let want = self.outstanding[self.outstanding_tick];
            if want == 0.0 {
                self.outstanding_tick += 1;
                continue;
            }
            let give = want.min(self.balance);
            self.balance -= give;
            self.granted[now] += give;
            self.outstanding[self.outstanding_tick] -= give;
            if give < want {
                // Partial fill: the same tick stays at the head.
                break;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
