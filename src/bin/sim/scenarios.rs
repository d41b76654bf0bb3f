// Built-in Workloads
// Used when no input directory exists, or with --builtin

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub toml: &'static str,
}

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "a",
            label: "Two noisy nodes, one drops out, a late joiner",
            toml: r#"
[config]
timeframe_secs = 400.0
tick_secs = 0.1

[[nodes]]
terms = [
  { type = "constant", value = 200.0 },
  { type = "noise", amplitude = 100.0, smoothness = 100 },
  { type = "constant", value = -500.0, start = 300.0 },
]

[[nodes]]
terms = [
  { type = "constant", value = 80.0 },
  { type = "noise", amplitude = 40.0, smoothness = 10 },
]

[[nodes]]
terms = [{ type = "constant", value = 400.0, start = 50.0 }]
"#,
        },
        Scenario {
            name: "noisy",
            label: "Noise on constant and periodic demand",
            toml: r#"
[config]
timeframe_secs = 200.0
tick_secs = 0.1

[[nodes]]
terms = [
  { type = "constant", value = 200.0 },
  { type = "noise", amplitude = 100.0, smoothness = 100 },
]

[[nodes]]
terms = [
  { type = "constant", value = 80.0 },
  { type = "noise", amplitude = 40.0, smoothness = 10 },
]

[[nodes]]
terms = [
  { type = "sine", amplitude = 120.0, period = 100.0 },
  { type = "noise", amplitude = 40.0, smoothness = 30 },
]
"#,
        },
        Scenario {
            name: "test",
            label: "Ramps, a sine and a gaussian bump",
            toml: r#"
[config]
timeframe_secs = 200.0
tick_secs = 0.1

[[nodes]]
terms = [
  { type = "constant", value = 100.0 },
  { type = "ramp", start = 25.0, duration = 50.0, delta = 50.0 },
  { type = "ramp", start = 125.0, duration = 2.0, delta = -50.0 },
]

[[nodes]]
terms = [
  { type = "constant", value = 50.0 },
  { type = "ramp", start = 50.0, duration = 50.0, delta = 100.0 },
  { type = "ramp", start = 100.0, duration = 25.0, delta = -60.0 },
  { type = "ramp", start = 27.0, duration = 5.0, delta = -40.0 },
]

[[nodes]]
terms = [{ type = "sine", period = 75.0, amplitude = 100.0 }]

[[nodes]]
terms = [{ type = "gaussian", start = 100.0, duration = 75.0, amplitude = 200.0 }]
"#,
        },
        Scenario {
            name: "step",
            label: "Single node, step to twice the rate after one second",
            toml: r#"
[config]
timeframe_secs = 10.0
tick_secs = 0.1
rate_per_sec = 10.0
initial_burst = 10.0
max_burst = 10.0

[[nodes]]
terms = [{ type = "constant", value = 20.0, start = 1.0 }]
"#,
        },
        Scenario {
            name: "contention",
            label: "Two equal nodes over supply, one light node",
            toml: r#"
[config]
timeframe_secs = 120.0
tick_secs = 0.1
rate_per_sec = 100.0

[[nodes]]
terms = [{ type = "constant", value = 100.0 }]

[[nodes]]
terms = [{ type = "constant", value = 100.0 }]

[[nodes]]
terms = [{ type = "constant", value = 20.0 }]
"#,
        },
    ]
}
