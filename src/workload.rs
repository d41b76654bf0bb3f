// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Demand Synthesis
//
// A node's demand curve is the sum of simple declarative terms (constant,
// ramp, sine, gaussian bump, smoothed noise), each active over a time window.
// Noise draws from a ChaCha8 stream per (node, term), so a run is reproducible
// bit-for-bit from the config seed.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::types::{RateSeries, TickSchedule};

/// Width of a gaussian at 1% of its peak, in standard deviations.
fn one_percent_width() -> f64 {
    2.0 * (2.0 * 100f64.ln()).sqrt()
}

// ─── Terms ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TermKind {
    /// Adds `value` over the window.
    Constant { value: f64 },
    /// Rises linearly to `delta` across the window, then holds it to the end.
    Ramp { delta: f64 },
    /// Raised sine between 0 and `amplitude`, starting at its trough.
    Sine { period: f64, amplitude: f64 },
    /// Bump centred in the window; the window is its width at 1% of peak.
    Gaussian { amplitude: f64 },
    /// Gaussian samples every `smoothness` ticks, cosine-interpolated.
    Noise { amplitude: f64, smoothness: usize },
}

impl TermKind {
    fn parameters(&self) -> Vec<(&'static str, f64)> {
        match *self {
            TermKind::Constant { value } => vec![("value", value)],
            TermKind::Ramp { delta } => vec![("delta", delta)],
            TermKind::Sine { period, amplitude } => vec![("period", period), ("amplitude", amplitude)],
            TermKind::Gaussian { amplitude } | TermKind::Noise { amplitude, .. } => {
                vec![("amplitude", amplitude)]
            }
        }
    }
}

/// One term of a demand curve. `duration == 0` means "until the end".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    #[serde(flatten)]
    pub kind: TermKind,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
}

impl Term {
    pub fn constant(value: f64) -> Self {
        Self { kind: TermKind::Constant { value }, start: 0.0, duration: 0.0 }
    }

    pub fn window(mut self, start: f64, duration: f64) -> Self {
        self.start = start;
        self.duration = duration;
        self
    }

    fn add_to(
        &self,
        out: &mut RateSeries,
        schedule: &TickSchedule,
        timeframe_secs: f64,
        rng: &mut ChaCha8Rng,
    ) -> std::result::Result<(), String> {
        if !(0.0..=timeframe_secs).contains(&self.start) {
            return Err(format!("start {} outside [0, {}]", self.start, timeframe_secs));
        }
        if !(self.duration >= 0.0) {
            return Err(format!("negative duration {}", self.duration));
        }
        if !self.duration.is_finite() {
            return Err(format!("non-finite duration {}", self.duration));
        }
        // A NaN here would survive the final clamp as zero demand.
        if let Some((name, v)) = self.kind.parameters().into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("non-finite {name} {v}"));
        }
        let n = out.len();
        let start = schedule.tick_for_time(self.start).min(n);
        let end = if self.duration > 0.0 {
            schedule.tick_for_time(self.start + self.duration).min(n)
        } else {
            n
        };

        match self.kind {
            TermKind::Constant { value } => {
                for i in start..end {
                    out[i] += value;
                }
            }
            TermKind::Ramp { delta } => {
                let span = (end - start) as f64;
                for i in start..end {
                    out[i] += delta * (i - start) as f64 / span;
                }
                for i in end..n {
                    out[i] += delta;
                }
            }
            TermKind::Sine { period, amplitude } => {
                let period_ticks = if period > 0.0 { schedule.tick_for_time(period) } else { 0 };
                if period_ticks == 0 {
                    return Err(format!("invalid sine period {period}"));
                }
                for i in start..end {
                    let phase = 2.0 * PI * (i - start) as f64 / period_ticks as f64;
                    out[i] += amplitude * (0.5 + 0.5 * (phase - 0.5 * PI).sin());
                }
            }
            TermKind::Gaussian { amplitude } => {
                if self.duration <= 0.0 {
                    return Err("gaussian needs a positive duration".to_string());
                }
                let centre = self.start + 0.5 * self.duration;
                let sigma = self.duration / one_percent_width();
                for i in 0..n {
                    let d = schedule.time_for_tick(i) - centre;
                    out[i] += amplitude * (-0.5 * d * d / (sigma * sigma)).exp();
                }
            }
            TermKind::Noise { amplitude, smoothness } => {
                if smoothness == 0 {
                    return Err("invalid noise smoothness 0".to_string());
                }
                let stddev = amplitude / one_percent_width();
                let mut last = 0.0;
                let mut next = standard_normal(rng) * stddev;
                for i in start..end {
                    let since = (i - start) % smoothness;
                    if since == 0 {
                        last = next;
                        next = standard_normal(rng) * stddev;
                        out[i] += last;
                        continue;
                    }
                    let alpha = since as f64 / smoothness as f64;
                    let g = (1.0 - (PI * alpha).cos()) / 2.0;
                    out[i] += (1.0 - g) * last + g * next;
                }
            }
        }
        Ok(())
    }
}

/// Box-Muller transform.
fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    // (0, 1] keeps the logarithm finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

// ─── WorkloadDesc ────────────────────────────────────────────────────────────

/// Declarative demand of one node: the sum of its terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDesc {
    #[serde(default)]
    pub terms: Vec<Term>,
}

impl WorkloadDesc {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    /// Demand rate series for the node at position `node`, clamped to >= 0.
    pub fn generate(&self, cfg: &SimConfig, node: usize) -> Result<RateSeries> {
        let schedule = cfg.schedule();
        let mut out = RateSeries::zeros(schedule.num_ticks);
        for (idx, term) in self.terms.iter().enumerate() {
            let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
            rng.set_stream(((node as u64) << 32) | idx as u64);
            term.add_to(&mut out, &schedule, cfg.timeframe_secs, &mut rng)
                .map_err(|reason| SimError::InvalidTerm { node, term: idx, reason })?;
        }
        for v in out.0.iter_mut() {
            *v = v.max(0.0);
        }
        Ok(out)
    }
}

/// Generate every node's demand, in node order.
pub fn generate_all(cfg: &SimConfig, nodes: &[WorkloadDesc]) -> Result<Vec<RateSeries>> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, w)| w.generate(cfg, i))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SimConfig {
        SimConfig { timeframe_secs: 10.0, tick_secs: 0.1, ..Default::default() }
    }

    fn one(term: Term) -> RateSeries {
        WorkloadDesc::new(vec![term]).generate(&cfg(), 0).expect("test: valid term")
    }

    #[test]
    fn constant_respects_window() {
        let s = one(Term::constant(5.0).window(2.0, 3.0));
        assert_eq!(s[19], 0.0);
        assert_eq!(s[20], 5.0);
        assert_eq!(s[49], 5.0);
        assert_eq!(s[50], 0.0);
    }

    #[test]
    fn ramp_holds_delta_after_window() {
        let s = one(Term { kind: TermKind::Ramp { delta: 10.0 }, start: 0.0, duration: 1.0 });
        assert_eq!(s[0], 0.0);
        assert!((s[5] - 5.0).abs() < 1e-12);
        assert_eq!(s[10], 10.0);
        assert_eq!(s[99], 10.0);
    }

    #[test]
    fn sine_starts_at_trough_and_peaks_half_period_later() {
        let s = one(Term {
            kind: TermKind::Sine { period: 2.0, amplitude: 8.0 },
            start: 0.0,
            duration: 0.0,
        });
        assert!(s[0].abs() < 1e-9);
        assert!((s[10] - 8.0).abs() < 1e-9);
        assert!(s[20].abs() < 1e-9);
    }

    #[test]
    fn gaussian_peaks_at_centre() {
        let s = one(Term { kind: TermKind::Gaussian { amplitude: 100.0 }, start: 2.0, duration: 4.0 });
        assert!((s[40] - 100.0).abs() < 1e-9);
        // Window edges sit at 1% of the peak.
        assert!((s[20] - 1.0).abs() < 1e-6);
        assert!((s[60] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn noise_is_reproducible_per_node() {
        let desc = WorkloadDesc::new(vec![
            Term::constant(50.0),
            Term { kind: TermKind::Noise { amplitude: 20.0, smoothness: 5 }, start: 0.0, duration: 0.0 },
        ]);
        let a = desc.generate(&cfg(), 3).expect("test: valid");
        let b = desc.generate(&cfg(), 3).expect("test: valid");
        let other = desc.generate(&cfg(), 4).expect("test: valid");
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn negative_sums_are_clamped() {
        let desc = WorkloadDesc::new(vec![Term::constant(3.0), Term::constant(-5.0).window(5.0, 0.0)]);
        let s = desc.generate(&cfg(), 0).expect("test: valid");
        assert_eq!(s[10], 3.0);
        assert_eq!(s[60], 0.0);
    }

    #[test]
    fn bad_terms_are_reported_with_position() {
        let desc = WorkloadDesc::new(vec![
            Term::constant(1.0),
            Term::constant(1.0).window(11.0, 0.0),
        ]);
        let err = desc.generate(&cfg(), 2).expect_err("test: out of range");
        assert!(matches!(err, SimError::InvalidTerm { node: 2, term: 1, .. }), "got {err}");

        let zero = WorkloadDesc::new(vec![Term {
            kind: TermKind::Noise { amplitude: 1.0, smoothness: 0 },
            start: 0.0,
            duration: 0.0,
        }]);
        assert!(zero.generate(&cfg(), 0).is_err());
    }

    #[test]
    fn non_finite_parameters_are_rejected() {
        let bad = [
            Term::constant(f64::NAN),
            Term { kind: TermKind::Ramp { delta: f64::INFINITY }, start: 0.0, duration: 1.0 },
            Term { kind: TermKind::Sine { period: f64::NAN, amplitude: 1.0 }, start: 0.0, duration: 0.0 },
            Term { kind: TermKind::Gaussian { amplitude: f64::NEG_INFINITY }, start: 1.0, duration: 2.0 },
            Term::constant(1.0).window(0.0, f64::INFINITY),
        ];
        for term in bad {
            let err = WorkloadDesc::new(vec![term.clone()])
                .generate(&cfg(), 0)
                .expect_err("test: non-finite parameter");
            match err {
                SimError::InvalidTerm { node: 0, term: 0, reason } => {
                    assert!(reason.starts_with("non-finite"), "{term:?}: {reason}")
                }
                other => panic!("{term:?}: got {other}"),
            }
        }

        // TOML spells these `nan` and `inf`, and they parse fine.
        let desc: WorkloadDesc = toml::from_str(r#"terms = [{ type = "constant", value = nan }]"#)
            .expect("test: valid toml");
        assert!(matches!(desc.generate(&cfg(), 3), Err(SimError::InvalidTerm { node: 3, term: 0, .. })));
    }

    #[test]
    fn terms_parse_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            nodes: Vec<WorkloadDesc>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[nodes]]
            terms = [
              { type = "constant", value = 200 },
              { type = "noise", amplitude = 100, smoothness = 100 },
            ]

            [[nodes]]
            [[nodes.terms]]
            type = "sine"
            period = 75.0
            amplitude = 100.0
            start = 5.0
            "#,
        )
        .expect("test: valid toml");
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].terms[0].kind, TermKind::Constant { value: 200.0 });
        assert_eq!(doc.nodes[1].terms[0].start, 5.0);
    }
}
