// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite

pub mod types;
pub mod config;
pub mod error;
pub mod ideal;
pub mod distributed;
pub mod simulation;
pub mod conservation;
pub mod workload;
pub mod report;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use report::{charts, process, Chart, Input, Output, Series};
pub use simulation::{AllocationOutcome, Comparison, DistributedRun, Simulation};
pub use types::*;
pub use workload::{Term, TermKind, WorkloadDesc};

use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

fn install_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
}

/// Run both algorithms on an `Input` object and return the `Output` charts.
#[wasm_bindgen(js_name = process)]
pub fn process_js(input: JsValue) -> std::result::Result<JsValue, JsValue> {
    install_panic_hook();
    let input: Input = serde_wasm_bindgen::from_value(input)
        .map_err(|e| JsValue::from_str(&format!("invalid input: {e}")))?;
    let output = report::process(&input).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&output).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Default configuration, for seeding UI forms.
#[wasm_bindgen]
pub fn default_config() -> JsValue {
    serde_wasm_bindgen::to_value(&SimConfig::default()).unwrap_or(JsValue::NULL)
}
