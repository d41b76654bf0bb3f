// Distributed Token Bucket Runner
// Runs the ideal and the two-tier allocator side by side on each workload
//
// Usage:
//   cargo run --release --bin sim                          # Every *.toml under input/
//   cargo run --release --bin sim -- --builtin             # Built-in workloads
//   cargo run --release --bin sim -- --builtin step        # Filter by name
//   cargo run --release --bin sim -- --time-series         # Also write per-tick JSONL
//   cargo run --release --bin sim -- --log-level debug     # Log every refill

mod metrics;
mod report;
mod scenarios;
mod time_series;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use distbucket_engine::Input;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use metrics::WorkloadMetrics;
use report::{SuiteReport, Summary, WorkloadResult};
use time_series::TimeSeriesRecorder;

// ─── CLI ────────────────────────────────────────────────────────────────────

/// Compare a perfect token bucket against the distributed one
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of workload files (*.toml)
    #[arg(short, long, default_value = "input")]
    input: PathBuf,

    /// Directory for charts and the summary report
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Run the built-in workloads even if the input directory exists
    #[arg(long)]
    builtin: bool,

    /// Write a per-tick JSONL trace for each workload
    #[arg(long)]
    time_series: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: Level,

    /// Only run workloads whose name contains this
    filter: Option<String>,
}

struct Job {
    name: String,
    label: String,
    input: Input,
}

fn builtin_jobs() -> Result<Vec<Job>, Box<dyn Error>> {
    scenarios::scenarios()
        .into_iter()
        .map(|s| -> Result<Job, Box<dyn Error>> {
            Ok(Job {
                name: s.name.to_string(),
                label: s.label.to_string(),
                input: Input::from_toml_str(s.toml)?,
            })
        })
        .collect()
}

fn load_jobs(dir: &Path) -> Result<Vec<Job>, Box<dyn Error>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut jobs = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let contents = std::fs::read_to_string(&path)?;
        let input = Input::from_toml_str(&contents)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        jobs.push(Job { label: path.display().to_string(), name, input });
    }
    Ok(jobs)
}

fn fmt_gap(gap: Option<f64>) -> String {
    gap.map_or_else(|| "-".to_string(), |g| format!("{:.2}%", g * 100.0))
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn run_job(job: &Job, cli: &Cli) -> Result<WorkloadResult, Box<dyn Error>> {
    let start = Instant::now();
    let sim = job.input.simulation()?;
    let comparison = sim.run()?;
    let m = WorkloadMetrics::new(&sim, &comparison);
    let elapsed_ms = start.elapsed().as_millis();

    let charts = distbucket_engine::charts(&sim, &comparison);
    std::fs::write(cli.output.join(format!("{}.json", job.name)), charts.to_json()?)?;

    if cli.time_series {
        let recorder = TimeSeriesRecorder::from_run(&sim, &comparison);
        let path = cli.output.join("time-series").join(format!("{}.jsonl", job.name));
        recorder.write_jsonl(&path)?;
        info!(workload = %job.name, ticks = recorder.len(), path = %path.display(), "time series written");
    }

    Ok(WorkloadResult::new(
        &job.name,
        &job.label,
        sim.num_nodes(),
        sim.schedule().num_ticks,
        &m,
        elapsed_ms,
    ))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {e}");
    }

    let jobs = if cli.builtin || !cli.input.exists() {
        info!("using built-in workloads");
        builtin_jobs()
    } else {
        load_jobs(&cli.input)
    };
    let jobs = match jobs {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("failed to load workloads: {e}");
            return ExitCode::FAILURE;
        }
    };

    let to_run: Vec<&Job> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            jobs.iter().filter(|j| j.name.to_lowercase().contains(&f_lower)).collect()
        }
        None => jobs.iter().collect(),
    };
    if to_run.is_empty() {
        eprintln!("No workloads match filter: {:?}", cli.filter);
        return ExitCode::FAILURE;
    }

    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        error!("failed to create {}: {e}", cli.output.display());
        return ExitCode::FAILURE;
    }

    println!("\n  Distributed Token Bucket Runner v{}", env!("CARGO_PKG_VERSION"));
    println!("  Running {} workload(s)...\n", to_run.len());
    println!(
        "  {:<14} {:>5} {:>12} {:>12} {:>12} {:>9} {:>9} {:>12}  {}",
        "Workload", "Nodes", "Requested", "Ideal", "Distributed", "Unfair(I)", "Unfair(D)", "MinTokens", "Conservation"
    );
    println!("  {}", "-".repeat(104));

    let suite_start = Instant::now();
    let mut results = Vec::new();
    let mut errors = 0;
    for job in to_run {
        match run_job(job, &cli) {
            Ok(r) => {
                println!(
                    "  {:<14} {:>5} {:>12.1} {:>12.1} {:>12.1} {:>9} {:>9} {:>12.1}  {}",
                    r.name,
                    r.nodes,
                    r.requested,
                    r.ideal_granted,
                    r.distributed_granted,
                    fmt_gap(r.ideal_unfairness),
                    fmt_gap(r.distributed_unfairness),
                    r.min_global_tokens,
                    if r.conservation_holds { "PASS" } else { "FAIL" },
                );
                results.push(r);
            }
            Err(e) => {
                errors += 1;
                println!("  {:<14} ERROR: {}", job.name, e);
            }
        }
    }

    let total = results.len() + errors;
    let passed = results.iter().filter(|r| r.conservation_holds).count();
    let failed = total - passed;
    println!("  {}", "-".repeat(104));
    println!(
        "  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total,
        passed,
        failed,
        suite_start.elapsed().as_secs_f64()
    );

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string();
    let report = SuiteReport {
        timestamp,
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        summary: Summary { total, passed, failed },
        workloads: results,
    };
    let path = cli.output.join("summary.json");
    match serde_json::to_string_pretty(&report) {
        Ok(json) => match std::fs::write(&path, json) {
            Ok(()) => println!("  Results saved to: {}\n", path.display()),
            Err(e) => error!("failed to write {}: {e}", path.display()),
        },
        Err(e) => error!("failed to serialize report: {e}"),
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
