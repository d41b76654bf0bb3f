// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Simulation Core

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SimConfig;
use crate::distributed::{GlobalBucket, LocalBucket, RefillPolicy};
use crate::error::{Result, SimError};
use crate::ideal::IdealAllocator;
use crate::types::{NodeId, RateSeries, TickSchedule};

// ─── AllocationOutcome ───────────────────────────────────────────────────────

/// Granted series per node (in node order) plus the global token trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub granted: Vec<RateSeries>,
    /// Global token level at each tick, after that tick's refill.
    pub tokens: RateSeries,
    /// Refill requests each local bucket sent; empty for the ideal allocator.
    #[serde(default)]
    pub refills: Vec<u32>,
}

impl AllocationOutcome {
    pub fn new(granted: Vec<RateSeries>, tokens: RateSeries) -> Self {
        Self { granted, tokens, refills: Vec::new() }
    }

    pub fn num_ticks(&self) -> usize {
        self.tokens.len()
    }

    pub fn aggregate(&self) -> RateSeries {
        RateSeries::sum_of(&self.granted, self.num_ticks())
    }

    fn into_rates(mut self, schedule: &TickSchedule) -> Self {
        self.granted = self.granted.iter().map(|g| g.to_rates(schedule)).collect();
        self
    }
}

/// Both algorithms run against the same demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub ideal: AllocationOutcome,
    pub distributed: AllocationOutcome,
}

// ─── DistributedRun ──────────────────────────────────────────────────────────

/// Tick-by-tick execution of the two-tier algorithm.
///
/// Each step refills the global bucket, records its level, then advances
/// every local bucket in node order. Granted values are absolute amounts
/// until [`finish`](Self::finish) converts them back to rates.
#[derive(Debug, Clone)]
pub struct DistributedRun {
    schedule: TickSchedule,
    now: usize,
    global: GlobalBucket,
    locals: Vec<LocalBucket>,
    tokens: RateSeries,
}

impl DistributedRun {
    fn new(cfg: &SimConfig, schedule: TickSchedule, demand: &[RateSeries]) -> Self {
        let policy = RefillPolicy::new(cfg);
        let locals = demand
            .iter()
            .enumerate()
            .map(|(i, d)| LocalBucket::new(NodeId(i as u32), policy, d.to_amounts(&schedule)))
            .collect();
        Self {
            schedule,
            now: 0,
            global: GlobalBucket::new(cfg),
            locals,
            tokens: RateSeries::zeros(schedule.num_ticks),
        }
    }

    /// Next tick to run.
    pub fn now(&self) -> usize {
        self.now
    }

    pub fn is_done(&self) -> bool {
        self.now >= self.schedule.num_ticks
    }

    pub fn global(&self) -> &GlobalBucket {
        &self.global
    }

    pub fn locals(&self) -> &[LocalBucket] {
        &self.locals
    }

    /// Run one tick. Returns `false` once the horizon is exhausted.
    pub fn step(&mut self) -> Result<bool> {
        if self.is_done() {
            return Ok(false);
        }
        let now = self.now;
        self.global.tick(now);
        self.tokens[now] = self.global.tokens();
        for local in &mut self.locals {
            local.tick(now, &mut self.global)?;
        }
        self.now += 1;
        Ok(true)
    }

    pub fn finish(mut self) -> Result<AllocationOutcome> {
        while self.step()? {}
        let refills = self.locals.iter().map(|l| l.refills()).collect();
        let granted = self.locals.into_iter().map(|l| l.into_granted()).collect();
        let mut outcome = AllocationOutcome::new(granted, self.tokens).into_rates(&self.schedule);
        outcome.refills = refills;
        Ok(outcome)
    }
}

// ─── Simulation ──────────────────────────────────────────────────────────────

/// Validated configuration plus one demand rate series per node.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    schedule: TickSchedule,
    demand: Vec<RateSeries>,
}

impl Simulation {
    /// Checks the config and every demand series before anything runs.
    pub fn new(config: SimConfig, demand: Vec<RateSeries>) -> Result<Self> {
        config.validate()?;
        let schedule = config.schedule();
        for (node, series) in demand.iter().enumerate() {
            if series.len() != schedule.num_ticks {
                return Err(SimError::DemandLength {
                    node,
                    expected: schedule.num_ticks,
                    actual: series.len(),
                });
            }
            if let Some((tick, &value)) = series.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(SimError::NonFiniteDemand { node, tick, value });
            }
            if let Some((tick, &value)) = series.iter().enumerate().find(|(_, v)| **v < 0.0) {
                return Err(SimError::NegativeDemand { node, tick, value });
            }
        }
        Ok(Self { config, schedule, demand })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn schedule(&self) -> TickSchedule {
        self.schedule
    }

    pub fn demand(&self) -> &[RateSeries] {
        &self.demand
    }

    pub fn num_nodes(&self) -> usize {
        self.demand.len()
    }

    /// Perfect-knowledge allocation.
    pub fn run_ideal(&self) -> AllocationOutcome {
        let requested = self.demand.iter().map(|d| d.to_amounts(&self.schedule)).collect();
        let outcome = IdealAllocator::new(&self.config)
            .allocate(requested, self.schedule.num_ticks)
            .into_rates(&self.schedule);
        info!(
            nodes = self.num_nodes(),
            ticks = self.schedule.num_ticks,
            "ideal run complete"
        );
        outcome
    }

    /// Start a step-wise distributed run.
    pub fn distributed(&self) -> DistributedRun {
        DistributedRun::new(&self.config, self.schedule, &self.demand)
    }

    /// Two-tier allocation over the whole horizon.
    pub fn run_distributed(&self) -> Result<AllocationOutcome> {
        let outcome = self.distributed().finish()?;
        info!(
            nodes = self.num_nodes(),
            ticks = self.schedule.num_ticks,
            refills = outcome.refills.iter().sum::<u32>(),
            min_tokens = outcome.tokens.min(),
            "distributed run complete"
        );
        Ok(outcome)
    }

    pub fn run(&self) -> Result<Comparison> {
        Ok(Comparison {
            ideal: self.run_ideal(),
            distributed: self.run_distributed()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SimConfig {
        SimConfig {
            timeframe_secs: 10.0,
            tick_secs: 0.1,
            rate_per_sec: 10.0,
            initial_burst: 10.0,
            max_burst: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Simulation::new(cfg(), vec![RateSeries::zeros(5)]).expect_err("test: must fail");
        assert_eq!(err, SimError::DemandLength { node: 0, expected: 100, actual: 5 });
    }

    #[test]
    fn rejects_negative_demand() {
        let mut d = RateSeries::zeros(100);
        d[7] = -1.0;
        let err = Simulation::new(cfg(), vec![RateSeries::zeros(100), d]).expect_err("test: must fail");
        assert_eq!(err, SimError::NegativeDemand { node: 1, tick: 7, value: -1.0 });
    }

    #[test]
    fn rejects_non_finite_demand() {
        let mut d = RateSeries::zeros(100);
        d[3] = -1.0;
        d[9] = f64::INFINITY;
        let err = Simulation::new(cfg(), vec![d.clone()]).expect_err("test: must fail");
        assert_eq!(err, SimError::NonFiniteDemand { node: 0, tick: 9, value: f64::INFINITY });

        d[9] = f64::NAN;
        let err = Simulation::new(cfg(), vec![d]).expect_err("test: must fail");
        assert!(matches!(err, SimError::NonFiniteDemand { node: 0, tick: 9, .. }), "got {err}");
        assert!(err.to_string().contains("non-finite demand"));
    }

    #[test]
    fn rejects_invalid_config_before_running() {
        let c = SimConfig { tick_secs: -0.1, ..cfg() };
        assert!(matches!(
            Simulation::new(c, Vec::new()),
            Err(SimError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn no_nodes_yields_only_token_trace() {
        let sim = Simulation::new(cfg(), Vec::new()).expect("test: valid");
        let out = sim.run().expect("test: run");
        assert!(out.ideal.granted.is_empty());
        assert!(out.distributed.granted.is_empty());
        assert_eq!(out.distributed.tokens.len(), 100);
    }

    #[test]
    fn step_runs_each_tick_once() {
        let sim = Simulation::new(cfg(), vec![RateSeries(vec![1.0; 100])]).expect("test: valid");
        let mut run = sim.distributed();
        let mut steps = 0;
        while run.step().expect("test: step") {
            steps += 1;
        }
        assert_eq!(steps, 100);
        assert!(run.is_done());
        assert!(!run.step().expect("test: step"));
    }

    #[test]
    fn outcome_is_in_rate_units() {
        // Demand well under supply is served in full by both algorithms.
        let sim = Simulation::new(cfg(), vec![RateSeries(vec![2.0; 100])]).expect("test: valid");
        let out = sim.run().expect("test: run");
        for t in 0..100 {
            assert!((out.ideal.granted[0][t] - 2.0).abs() < 1e-9);
        }
        let total: f64 = out.distributed.granted[0].total();
        assert!((total - 200.0).abs() < 1e-6, "distributed total {total}");
    }
}
