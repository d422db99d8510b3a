//! Core error kinds, modeled on `freddiehaddad-oxidized`'s use of
//! `thiserror` for typed error enums. The core never aborts the process:
//! every fallible entry point returns a `Result` the driver decides how to
//! handle per song.

use thiserror::Error;

use crate::events::ChartId;
use crate::step_graph::GraphNode;

/// Why a search over the input StepGraph failed to explain the chart.
#[derive(Debug, Clone, Error)]
pub enum ExpressionFailure {
    #[error("no path through the input step graph matches the events at beat {beat}")]
    NoMatchingPath { beat: f64 },
    #[error("input chart ends mid-hold on lane {lane}")]
    UnclosedHold { lane: usize },
}

/// Why a search over the output StepGraph failed to realise an
/// ExpressedChart.
#[derive(Debug, Clone, Error)]
pub enum PerformanceFailure {
    #[error("no path through the output step graph honours the expressed chart, all root tiers exhausted")]
    AllRootTiersExhausted,
    #[error("expressed chart step at beat {beat} has no matching output link")]
    NoMatchingLink { beat: f64 },
}

/// The core's top-level error type. `Programmer` covers invariant
/// violations: ArrowData mirror asymmetry, a release/step collision
/// escaping into output, or an event-count mismatch.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invariant violation: {0}")]
    Programmer(String),
    #[error("expression failed: {0}")]
    Expression(#[from] ExpressionFailure),
    #[error("performance failed: {0}")]
    Performance(#[from] PerformanceFailure),
}

/// Logged via `tracing::warn!`, not returned as an `Err` — processing
/// continues after either of these.
#[derive(Debug, Clone)]
pub struct MinePlacementWarning {
    pub chart: ChartId,
    pub position_beat: f64,
}

#[derive(Debug, Clone)]
pub struct FallbackWarning {
    pub chart: ChartId,
    pub tier: usize,
    pub root: GraphNode,
}
