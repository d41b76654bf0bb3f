// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Distributed Token Bucket Simulation Suite - Error Types

/// Errors raised while setting up or running a simulation.
///
/// Configuration and input errors are reported before the first tick runs.
/// `Invariant` means the allocation algorithm itself produced an impossible
/// state; the run is aborted rather than continued on corrupt accounting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("node {node}, term {term}: {reason}")]
    InvalidTerm { node: usize, term: usize, reason: String },

    #[error("node {node}: demand has {actual} ticks, expected {expected}")]
    DemandLength { node: usize, expected: usize, actual: usize },

    #[error("node {node}: negative demand {value} at tick {tick}")]
    NegativeDemand { node: usize, tick: usize, value: f64 },

    #[error("node {node}: non-finite demand {value} at tick {tick}")]
    NonFiniteDemand { node: usize, tick: usize, value: f64 },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("failed to parse input: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidConfig { field, reason: reason.into() }
    }
}

impl From<toml::de::Error> for SimError {
    fn from(e: toml::de::Error) -> Self {
        SimError::Parse(e.to_string())
    }
}
