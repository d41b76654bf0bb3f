#[cfg(test)]
mod tests {
    use distbucket_engine::conservation::audit;
    use distbucket_engine::workload::TermKind;
    use distbucket_engine::{
        process, Input, RateSeries, SimConfig, SimError, Simulation, Term, WorkloadDesc,
    };

    fn small(rate_per_sec: f64, burst: f64, timeframe_secs: f64) -> SimConfig {
        SimConfig {
            timeframe_secs,
            tick_secs: 0.1,
            rate_per_sec,
            initial_burst: burst,
            max_burst: burst,
            ..Default::default()
        }
    }

    fn constant(rate: f64, ticks: usize) -> RateSeries {
        RateSeries(vec![rate; ticks])
    }

    // ========== Conservation & Global Cap ==========

    #[test]
    fn test_conservation_holds_for_both_algorithms() {
        let input = Input {
            config: SimConfig { timeframe_secs: 30.0, tick_secs: 0.05, ..Default::default() },
            nodes: vec![
                WorkloadDesc::new(vec![
                    Term::constant(200.0),
                    Term {
                        kind: TermKind::Noise { amplitude: 100.0, smoothness: 20 },
                        start: 0.0,
                        duration: 0.0,
                    },
                ]),
                WorkloadDesc::new(vec![Term {
                    kind: TermKind::Sine { period: 7.0, amplitude: 150.0 },
                    start: 2.0,
                    duration: 0.0,
                }]),
                WorkloadDesc::new(vec![Term::constant(60.0).window(10.0, 5.0)]),
            ],
        };
        let sim = input.simulation().expect("valid input");
        let out = sim.run().expect("run");

        let ideal = audit(&sim, &out.ideal);
        let distributed = audit(&sim, &out.distributed);
        assert!(ideal.holds(), "ideal audit failed: {:?}", ideal);
        assert!(distributed.holds(), "distributed audit failed: {:?}", distributed);
        assert_eq!(ideal.max_debt, 0.0, "ideal bucket never goes into debt");
    }

    #[test]
    fn test_ideal_never_exceeds_supply() {
        let c = small(10.0, 10.0, 20.0);
        let sim = Simulation::new(c.clone(), vec![constant(30.0, 200), constant(30.0, 200)])
            .expect("valid");
        let out = sim.run_ideal();
        let granted: f64 = out.aggregate().total() * c.tick_secs;
        let supply = c.initial_burst + c.rate_per_sec * c.timeframe_secs;
        assert!(granted <= supply + 1e-9, "granted {} of {}", granted, supply);
    }

    #[test]
    fn test_debt_shrinks_with_demand_below_rate() {
        // Bootstrap asks for 100 with 10 in the pool: 90 of debt at 1 token/tick.
        let c = SimConfig {
            initial_refill_amount: 100.0,
            min_refill_amount: 1.0,
            max_refill_amount: 5.0,
            ..small(10.0, 10.0, 30.0)
        };
        let sim = Simulation::new(c, vec![constant(5.0, 300)]).expect("valid");
        let out = sim.run_distributed().expect("run");
        let tokens = &out.tokens;

        assert!((tokens[1] + 89.0).abs() < 1e-9, "tokens[1] = {}", tokens[1]);
        for t in 2..=100 {
            assert!(tokens[t] > tokens[t - 1], "debt grew at tick {}", t);
        }
        assert!((tokens[100] - 10.0).abs() < 1e-9);
        assert!(tokens.iter().skip(100).all(|&v| v >= 0.0), "debt came back");
    }

    // ========== Zero-Demand Invariance ==========

    #[test]
    fn test_zero_demand_node_requests_only_once() {
        let c = SimConfig { timeframe_secs: 20.0, ..Default::default() };
        let n = c.num_ticks();
        let sim = Simulation::new(c, vec![RateSeries::zeros(n), constant(300.0, n)]).expect("valid");
        let out = sim.run().expect("run");

        assert_eq!(out.distributed.refills[0], 1);
        assert!(out.distributed.granted[0].iter().all(|&v| v == 0.0));
        assert!(out.ideal.granted[0].iter().all(|&v| v == 0.0));
        assert!(out.distributed.refills[1] > 1);
    }

    // ========== Fairness ==========

    #[test]
    fn test_ideal_splits_contention_equally() {
        let c = small(10.0, 10.0, 20.0);
        let sim = Simulation::new(c, vec![constant(15.0, 200), constant(15.0, 200)]).expect("valid");
        let out = sim.run_ideal();
        let a = out.granted[0].cumulative();
        let b = out.granted[1].cumulative();
        for t in 0..200 {
            assert!((a[t] - b[t]).abs() <= 1e-9 * a[t].max(1.0), "diverged at tick {}", t);
        }
    }

    #[test]
    fn test_distributed_converges_under_contention() {
        // Two nodes each asking for the full global rate, over 12 refill periods.
        let c = SimConfig { timeframe_secs: 120.0, ..Default::default() };
        let n = c.num_ticks();
        let sim = Simulation::new(c.clone(), vec![constant(240.0, n), constant(240.0, n)])
            .expect("valid");
        let out = sim.run_distributed().expect("run");

        let a = out.granted[0].total();
        let b = out.granted[1].total();
        assert!(a > 0.0 && b > 0.0);
        let gap = (a - b).abs() / a.max(b);
        assert!(gap < 0.25, "relative gap {} (a = {}, b = {})", gap, a, b);
        assert!(audit(&sim, &out).holds());
    }

    #[test]
    fn test_long_overload_keeps_shares_finite() {
        // Backlog never drains, so the oldest entry ages to the full horizon.
        let c = SimConfig {
            timeframe_secs: 6000.0,
            tick_secs: 1.0,
            rate_per_sec: 1.0,
            ..Default::default()
        };
        let sim = Simulation::new(c.clone(), vec![constant(10.0, 6000), constant(10.0, 6000)])
            .expect("valid");
        let mut run = sim.distributed();
        while run.step().expect("step") {
            assert!(run.global().shares_sum().is_finite(), "tick {}", run.now());
        }
        let out = run.finish().expect("finish");
        assert!(audit(&sim, &out).holds());

        let tail = |g: &RateSeries| g.iter().skip(5500).sum::<f64>();
        let (a, b) = (tail(&out.granted[0]), tail(&out.granted[1]));
        assert!(a > 0.25 * (a + b) && b > 0.25 * (a + b), "tail split {} / {}", a, b);

        // Twice as long would overflow the age weights; rejected up front.
        let too_long = SimConfig { timeframe_secs: 8000.0, ..c };
        let err = Simulation::new(too_long, Vec::new()).expect_err("too long");
        assert!(matches!(err, SimError::InvalidConfig { field: "queued_time_scale_secs", .. }));
    }

    // ========== Work Conservation ==========

    #[test]
    fn test_ideal_serves_everything_below_supply() {
        let c = small(10.0, 10.0, 10.0);
        let demand = vec![constant(2.0, 100), constant(3.0, 100)];
        let sim = Simulation::new(c, demand.clone()).expect("valid");
        let out = sim.run_ideal();
        for (d, g) in demand.iter().zip(out.granted.iter()) {
            for t in 0..100 {
                assert!((d[t] - g[t]).abs() < 1e-9, "tick {}: {} vs {}", t, g[t], d[t]);
            }
        }
    }

    // ========== Scenarios ==========

    #[test]
    fn test_single_node_step_demand() {
        // 100 ticks, burst = 10 × rate × tick, demand steps to 2 × rate at tick 10.
        let c = small(10.0, 10.0, 10.0);
        let mut demand = RateSeries::zeros(100);
        for t in 10..100 {
            demand[t] = 20.0;
        }
        let sim = Simulation::new(c, vec![demand]).expect("valid");
        let g = &sim.run_ideal().granted[0];

        for t in 0..10 {
            assert_eq!(g[t], 0.0);
        }
        // Burst covers the extra token per tick for nine ticks.
        for t in 10..=18 {
            assert!((g[t] - 20.0).abs() < 1e-9, "tick {}: {}", t, g[t]);
        }
        for t in 19..100 {
            assert!((g[t] - 10.0).abs() < 1e-9, "tick {}: {}", t, g[t]);
        }
    }

    #[test]
    fn test_two_nodes_unequal_demand() {
        // A asks 0.2 × rate, B asks 2 × rate.
        let c = small(10.0, 10.0, 10.0);
        let sim = Simulation::new(c, vec![constant(2.0, 100), constant(20.0, 100)]).expect("valid");
        let out = sim.run_ideal();
        let (a, b) = (&out.granted[0], &out.granted[1]);

        // Burst serves both in full for seven ticks.
        for t in 0..=6 {
            assert!((a[t] - 2.0).abs() < 1e-9);
            assert!((b[t] - 20.0).abs() < 1e-9);
        }
        // Afterwards supply is split in proportion to demand.
        for t in 7..100 {
            let share = a[t] / (a[t] + b[t]);
            assert!((share - 1.0 / 11.0).abs() < 1e-9, "tick {}: share {}", t, share);
        }
        for t in 8..100 {
            assert!((a[t] + b[t] - 10.0).abs() < 1e-9, "tick {}", t);
        }
    }

    #[test]
    fn test_rate_amount_round_trip() {
        let c = SimConfig { tick_secs: 0.01, ..Default::default() };
        let schedule = c.schedule();
        let series = RateSeries((0..schedule.num_ticks).map(|i| (i as f64 * 0.37).sin().abs() * 300.0).collect());
        let back = series.to_amounts(&schedule).to_rates(&schedule);
        for (x, y) in series.iter().zip(back.iter()) {
            assert!((x - y).abs() <= 1e-12 * x.max(1.0));
        }
    }

    // ========== Driver ==========

    #[test]
    fn test_stepwise_run_matches_full_run() {
        let c = small(10.0, 10.0, 10.0);
        let sim = Simulation::new(c, vec![constant(8.0, 100), constant(6.0, 100)]).expect("valid");

        let mut run = sim.distributed();
        let mut levels = Vec::new();
        while run.step().expect("step") {
            levels.push(run.global().tokens());
            assert_eq!(run.locals().len(), 2);
            for local in run.locals() {
                assert!(local.balance() >= 0.0, "tick {}: balance {}", run.now(), local.balance());
                assert!(local.deadline() < run.now() || local.drain_rate() >= 0.0);
            }
        }
        let full = sim.run_distributed().expect("run");
        let stepped = run.finish().expect("finish");
        assert_eq!(full, stepped);
        assert_eq!(levels.len(), 100);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let input = Input {
            config: SimConfig { timeframe_secs: 10.0, seed: 42, ..Default::default() },
            nodes: vec![
                WorkloadDesc::new(vec![Term {
                    kind: TermKind::Noise { amplitude: 300.0, smoothness: 10 },
                    start: 0.0,
                    duration: 0.0,
                }]),
                WorkloadDesc::new(vec![Term::constant(150.0)]),
            ],
        };
        let first = process(&input).expect("process");
        let second = process(&input).expect("process");
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_term_fails_before_running() {
        let input = Input {
            config: SimConfig { timeframe_secs: 10.0, ..Default::default() },
            nodes: vec![WorkloadDesc::new(vec![Term {
                kind: TermKind::Gaussian { amplitude: 10.0 },
                start: 1.0,
                duration: 0.0,
            }])],
        };
        let err = process(&input).expect_err("gaussian without width");
        assert!(matches!(err, SimError::InvalidTerm { node: 0, term: 0, .. }), "got {}", err);
    }
}
