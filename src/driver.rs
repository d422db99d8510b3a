//! Wires the pipeline stages together: express an [`InputChart`] against
//! the input pad, perform it on the output pad, and return the resulting
//! [`OutputChart`].
//!
//! Grounded on `analysis::analyze`'s per-chart orchestration (open file,
//! walk its chart list, fold each into a report), generalised from
//! "compute statistics" into "produce a converted chart."

use rand::rngs::StdRng;
use tracing::info;

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::events::{ChartId, InputChart, InputEvent, OutputChart, OutputEvent};
use crate::expressed_chart::express;
use crate::pad::PadDescriptor;
use crate::performed_chart::{perform, SubstitutionCache};
use crate::step_graph::{NodeId, StepGraph};

/// Everything shared read-only across every chart converted in one run:
/// the two pads, their graphs, the output graph's substitution cache, and
/// the configured root-tier fallback order. Built once per (config,
/// output pad) pair and handed to every song task behind an `Arc`.
pub struct ConversionContext<'a> {
    pub input_pad: &'a PadDescriptor,
    pub input_graph: &'a StepGraph,
    pub output_pad: &'a PadDescriptor,
    pub output_graph: &'a StepGraph,
    pub substitution_cache: &'a SubstitutionCache,
    pub config: &'a CoreConfig,
    pub root_node_tiers: &'a [Vec<NodeId>],
}

/// Runs one chart's events through express → perform.
pub fn process_chart(
    context: &ConversionContext<'_>,
    chart_id: &ChartId,
    input: &InputChart,
    rng: &mut StdRng,
) -> Result<OutputChart, CoreError> {
    info!(chart = %chart_id, "expressing chart");
    let (expressed, _root) = express(input, context.input_graph, context.input_pad)?;

    info!(chart = %chart_id, steps = expressed.steps.len(), "performing chart");
    let performed = perform(
        chart_id,
        context.output_graph,
        context.output_pad,
        context.substitution_cache,
        &expressed,
        context.root_node_tiers,
        context.config,
        rng,
    )?;

    let input_non_mine = input
        .events
        .iter()
        .filter(|e| !matches!(e, InputEvent::LaneMine { .. }))
        .count();
    let output_non_mine = performed
        .events
        .iter()
        .filter(|e| !matches!(e, OutputEvent::LaneMine { .. }))
        .count();
    if input_non_mine != output_non_mine {
        return Err(CoreError::Programmer(format!(
            "{chart_id}: {input_non_mine} non-mine input events but {output_non_mine} non-mine output events"
        )));
    }

    Ok(OutputChart { events: performed.events })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{InputEvent, Position};
    use crate::seed::rng_for;

    #[test]
    fn process_chart_round_trips_through_identity_pads() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        let config = CoreConfig::default_for(pad.num_arrows);
        let cache = SubstitutionCache::build(&graph, &config);
        let root_tiers = vec![vec![graph.root]];

        let context = ConversionContext {
            input_pad: &pad,
            input_graph: &graph,
            output_pad: &pad,
            output_graph: &graph,
            substitution_cache: &cache,
            config: &config,
            root_node_tiers: &root_tiers,
        };

        let input = InputChart {
            events: vec![
                InputEvent::LaneTap { position: Position::new(0.0, 0), lane: 0 },
                InputEvent::LaneTap { position: Position::new(1.0, 48), lane: 1 },
            ],
        };
        let chart_id = ChartId { title: "t".into(), steps_type: "dance-single".into(), difficulty: "Hard".into() };
        let mut rng = rng_for("t.sm", 0);

        let output = process_chart(&context, &chart_id, &input, &mut rng).unwrap();
        assert_eq!(output.events.iter().filter(|e| matches!(e, crate::events::OutputEvent::LaneTap { .. })).count(), 2);
    }
}
