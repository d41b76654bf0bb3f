// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Report Packaging

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::simulation::{AllocationOutcome, Comparison, Simulation};
use crate::types::{NodeId, RateSeries};
use crate::workload::{self, WorkloadDesc};

/// A complete run request: configuration plus one demand description per node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default)]
    pub nodes: Vec<WorkloadDesc>,
}

impl Input {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let input: Input = toml::from_str(src)?;
        input.config.validate()?;
        Ok(input)
    }

    /// Demand series for every node, in node order.
    pub fn demand(&self) -> Result<Vec<RateSeries>> {
        workload::generate_all(&self.config, &self.nodes)
    }

    pub fn simulation(&self) -> Result<Simulation> {
        self.config.validate()?;
        Simulation::new(self.config.clone(), self.demand()?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub data: RateSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub series: Vec<Series>,
}

impl Chart {
    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Start of each tick, in seconds.
    pub time_axis: Vec<f64>,
    pub charts: Vec<Chart>,
}

impl Output {
    pub fn chart(&self, title: &str) -> Option<&Chart> {
        self.charts.iter().find(|c| c.title == title)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SimError::Parse(e.to_string()))
    }
}

struct ChartBuilder {
    smoothing: Option<f64>,
}

impl ChartBuilder {
    fn series(&self, name: impl Into<String>, data: &RateSeries) -> Series {
        let data = match self.smoothing {
            Some(alpha) => data.smooth(alpha),
            None => data.clone(),
        };
        Series { name: name.into(), data }
    }

    fn per_node(&self, title: &str, per_node: &[RateSeries]) -> Chart {
        Chart {
            title: title.to_string(),
            series: per_node
                .iter()
                .enumerate()
                .map(|(i, s)| self.series(NodeId(i as u32).to_string(), s))
                .collect(),
        }
    }

    fn bucket(&self, title: &str, outcome: &AllocationOutcome, tokens_name: &str) -> Chart {
        Chart {
            title: title.to_string(),
            series: vec![
                self.series("aggregate", &outcome.aggregate()),
                self.series(tokens_name, &outcome.tokens),
            ],
        }
    }
}

/// Run both algorithms over `input` and package the results as charts.
pub fn process(input: &Input) -> Result<Output> {
    let sim = input.simulation()?;
    let comparison = sim.run()?;
    Ok(charts(&sim, &comparison))
}

/// Package an already computed comparison, smoothing per the run's config.
pub fn charts(sim: &Simulation, comparison: &Comparison) -> Output {
    let schedule = sim.schedule();
    let demand = sim.demand();

    let b = ChartBuilder { smoothing: sim.config().smoothing };
    let charts = vec![
        b.per_node("Requested per node", demand),
        Chart {
            title: "Requested aggregate".to_string(),
            series: vec![b.series("aggregate", &RateSeries::sum_of(demand, schedule.num_ticks))],
        },
        b.bucket("Perfect token bucket", &comparison.ideal, "tokens"),
        b.bucket("Distributed token bucket", &comparison.distributed, "global tokens"),
        b.per_node("Granted per node (perfect)", &comparison.ideal.granted),
        b.per_node("Granted per node (distributed)", &comparison.distributed.granted),
    ];

    Output { time_axis: schedule.time_axis(), charts }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
