// Per-Tick JSONL Time Series Recorder
// One JSON line per tick: aggregate demand, both grants, both token levels

use distbucket_engine::{Comparison, Simulation};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct TickSnapshot {
    pub tick: usize,
    pub time: f64,
    pub requested: f64,
    pub ideal_granted: f64,
    pub distributed_granted: f64,
    pub ideal_tokens: f64,
    pub global_tokens: f64,
}

pub struct TimeSeriesRecorder {
    snapshots: Vec<TickSnapshot>,
}

impl TimeSeriesRecorder {
    pub fn from_run(sim: &Simulation, comparison: &Comparison) -> Self {
        let schedule = sim.schedule();
        let requested = distbucket_engine::RateSeries::sum_of(sim.demand(), schedule.num_ticks);
        let ideal = comparison.ideal.aggregate();
        let distributed = comparison.distributed.aggregate();
        let snapshots = (0..schedule.num_ticks)
            .map(|t| TickSnapshot {
                tick: t,
                time: schedule.time_for_tick(t),
                requested: requested[t],
                ideal_granted: ideal[t],
                distributed_granted: distributed[t],
                ideal_tokens: comparison.ideal.tokens[t],
                global_tokens: comparison.distributed.tokens[t],
            })
            .collect();
        Self { snapshots }
    }

    /// Write all snapshots to a JSONL file
    pub fn write_jsonl(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for snapshot in &self.snapshots {
            let line = serde_json::to_string(snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}
