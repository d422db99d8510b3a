//! PerformedChart search: realises an [`ExpressedChart`] on a (possibly
//! different) output [`StepGraph`], trying each candidate root tier in
//! order and substituting GraphLinks through a precomputed replacement
//! cache when the exact incoming link isn't available on the output pad.
//!
//! Grounded on the same `step_parity::StepParityGenerator` frontier search
//! [`crate::expressed_chart`] generalises, re-targeted here at substitution
//! plus lane-distribution cost instead of matching literal input events.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use tracing::warn;

use crate::config::CoreConfig;
use crate::error::{CoreError, FallbackWarning, MinePlacementWarning, PerformanceFailure};
use crate::events::{ChartId, MineType, OutputEvent, Position};
use crate::expressed_chart::ExpressedChart;
use crate::pad::PadDescriptor;
use crate::step_graph::{GraphLink, GraphLinkInstance, InstanceAnnotation, NodeId, StepGraph};
use crate::step_types::{Foot, FootAction, FootPortion, StepType, ALL_FEET, ALL_PORTIONS};

/// A full [`GraphLink`] replacement cache: for every distinct link in the
/// output graph, the ordered list of links that may stand in for it under
/// the configured [`CoreConfig::step_type_replacements`] map.
pub struct SubstitutionCache {
    table: HashMap<GraphLink, Vec<GraphLink>>,
}

impl SubstitutionCache {
    /// Built once before any PerformedChart search runs (spec's
    /// write-once, read-many cache lifecycle).
    pub fn build(graph: &StepGraph, config: &CoreConfig) -> Self {
        let mut table = HashMap::new();
        for link in graph.all_links() {
            let mut replacements = Vec::new();
            for candidate in candidate_links(link, config) {
                if !replacements.contains(&candidate) {
                    replacements.push(candidate);
                }
            }
            table.insert(link, replacements);
        }
        Self { table }
    }

    fn replacements_for(&self, link: GraphLink) -> Vec<GraphLink> {
        self.table.get(&link).cloned().unwrap_or_else(|| vec![link])
    }
}

/// Builds every link reachable by substituting each acting foot-portion's
/// StepType through its configured replacement set, preserving per-portion
/// FootAction identity and keeping both portions of a bracket on the same
/// replacement StepType. The original link is ordered first.
fn candidate_links(link: GraphLink, config: &CoreConfig) -> Vec<GraphLink> {
    let mut out = vec![link];

    for foot in ALL_FEET {
        let slots: Vec<(FootPortion, StepType, FootAction, usize)> = ALL_PORTIONS
            .into_iter()
            .filter_map(|p| link.slot(foot, p).map(|s| (p, s.step_type, s.action, s.arrow)))
            .collect();
        if slots.is_empty() {
            continue;
        }
        let is_bracket = slots.len() == 2;
        let base_step_type = slots[0].1;
        if is_bracket && slots.iter().any(|s| s.1 != base_step_type) {
            // Mixed StepTypes within one bracket never arise from our own
            // fill predicates, but guard the invariant explicitly.
            continue;
        }
        let empty = Vec::new();
        let replacements = config.step_type_replacements.get(&base_step_type).unwrap_or(&empty);
        let mut expanded = Vec::new();
        for existing in &out {
            for &replacement in replacements {
                if replacement == base_step_type {
                    continue;
                }
                let mut candidate = *existing;
                for &(portion, _, action, arrow) in &slots {
                    let new_slot = crate::step_graph::LinkSlot { step_type: replacement, action, arrow };
                    candidate = set_slot(candidate, foot, portion, new_slot);
                }
                expanded.push(candidate);
            }
        }
        out.extend(expanded);
    }
    out
}

fn set_slot(
    link: GraphLink,
    foot: Foot,
    portion: FootPortion,
    slot: crate::step_graph::LinkSlot,
) -> GraphLink {
    let mut single = GraphLink::single(foot, portion, slot);
    single = GraphLink::merge(single, link);
    single
}

#[derive(Clone)]
struct SearchNode {
    graph_node: NodeId,
    position: Position,
    step_counts: HashMap<usize, u32>,
    total_steps: u32,
    cost: f64,
    parent: Option<usize>,
    incoming: Option<GraphLinkInstance>,
}

#[derive(Clone, Debug)]
pub struct PerformedChart {
    pub events: Vec<OutputEvent>,
}

/// Tries each root tier in shuffled order until a complete path through
/// `graph` realises `expressed`, falling back to the next tier and logging
/// a [`FallbackWarning`] whenever tier 0 isn't used.
pub fn perform(
    chart_id: &ChartId,
    graph: &StepGraph,
    pad: &PadDescriptor,
    cache: &SubstitutionCache,
    expressed: &ExpressedChart,
    root_node_tiers: &[Vec<NodeId>],
    config: &CoreConfig,
    rng: &mut StdRng,
) -> Result<PerformedChart, CoreError> {
    let desired_weights = config.normalized_arrow_weights();
    for (tier_index, tier) in root_node_tiers.iter().enumerate() {
        let mut roots = tier.clone();
        roots.shuffle(rng);
        for &root in &roots {
            match search_from_root(graph, cache, expressed, root, rng, &desired_weights) {
                Ok(path) => {
                    if tier_index > 0 {
                        warn!(
                            chart = %chart_id,
                            tier = tier_index,
                            root = ?graph.node(root),
                            "used a fallback root tier"
                        );
                        let _ = FallbackWarning { chart: chart_id.clone(), tier: tier_index, root: *graph.node(root) };
                    }
                    let events = emit_events(pad, &path, expressed, chart_id);
                    return Ok(PerformedChart { events });
                }
                Err(_) => continue,
            }
        }
    }
    Err(CoreError::Performance(PerformanceFailure::AllRootTiersExhausted))
}

fn search_from_root(
    graph: &StepGraph,
    cache: &SubstitutionCache,
    expressed: &ExpressedChart,
    root: NodeId,
    rng: &mut StdRng,
    desired_weights: &[f64],
) -> Result<Vec<SearchNode>, PerformanceFailure> {
    let mut arena: Vec<SearchNode> = vec![SearchNode {
        graph_node: root,
        position: Position::new(f64::NEG_INFINITY, i64::MIN),
        step_counts: HashMap::new(),
        total_steps: 0,
        cost: 0.0,
        parent: None,
        incoming: None,
    }];
    let mut frontier = vec![0usize];

    for expressed_step in &expressed.steps {
        let desired = expressed_step.link.link;
        let mut replacements = cache.replacements_for(desired);
        replacements.shuffle(rng);

        let mut candidates: Vec<SearchNode> = Vec::new();
        for &parent_idx in &frontier {
            let parent_graph_node = arena[parent_idx].graph_node;
            for &candidate_link in &replacements {
                for &(edge_link, dest_id) in graph.links_from(parent_graph_node) {
                    if edge_link != candidate_link {
                        continue;
                    }
                    if collides_with_parent(&arena[parent_idx], &edge_link, expressed_step.position) {
                        continue;
                    }
                    let instance = carry_annotations(edge_link, expressed_step.link);
                    let mut step_counts = arena[parent_idx].step_counts.clone();
                    let mut total_steps = arena[parent_idx].total_steps;
                    for foot in ALL_FEET {
                        for portion in ALL_PORTIONS {
                            if let Some(slot) = edge_link.slot(foot, portion) {
                                if slot.action != FootAction::Release {
                                    *step_counts.entry(slot.arrow).or_insert(0) += 1;
                                    total_steps += 1;
                                }
                            }
                        }
                    }
                    candidates.push(SearchNode {
                        graph_node: dest_id,
                        position: expressed_step.position,
                        cost: distribution_cost(&step_counts, total_steps, desired_weights),
                        step_counts,
                        total_steps,
                        parent: Some(parent_idx),
                        incoming: Some(instance),
                    });
                }
            }
        }
        if candidates.is_empty() {
            return Err(PerformanceFailure::NoMatchingLink { beat: expressed_step.position.beat });
        }

        let mut best: HashMap<NodeId, usize> = HashMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            match best.get(&candidate.graph_node) {
                Some(&kept) if candidates[kept].cost <= candidate.cost => {}
                _ => {
                    best.insert(candidate.graph_node, idx);
                }
            }
        }
        let mut new_frontier = Vec::with_capacity(best.len());
        for idx in best.into_values() {
            let base = arena.len();
            arena.push(candidates[idx].clone());
            new_frontier.push(base);
        }
        frontier = new_frontier;
    }

    let best_final = frontier
        .into_iter()
        .min_by(|&a, &b| arena[a].cost.partial_cmp(&arena[b].cost).unwrap())
        .ok_or(PerformanceFailure::AllRootTiersExhausted)?;

    let mut path = Vec::new();
    let mut cur = Some(best_final);
    while let Some(idx) = cur {
        path.push(arena[idx].clone());
        cur = arena[idx].parent;
    }
    path.reverse();
    Ok(path)
}

/// Per spec §4.5.1: reject a child whose incoming link places a non-Release
/// action on an arrow the parent's incoming link released at the same
/// position.
fn collides_with_parent(parent: &SearchNode, link: &GraphLink, position: Position) -> bool {
    let Some(parent_incoming) = &parent.incoming else { return false };
    if parent.position != position {
        return false;
    }
    for foot in ALL_FEET {
        for portion in ALL_PORTIONS {
            if let Some(parent_slot) = parent_incoming.link.slot(foot, portion) {
                if parent_slot.action != FootAction::Release {
                    continue;
                }
                for other_foot in ALL_FEET {
                    for other_portion in ALL_PORTIONS {
                        if let Some(slot) = link.slot(other_foot, other_portion) {
                            if slot.arrow == parent_slot.arrow && slot.action != FootAction::Release {
                                return true;
                            }
                        }
                    }
                }
            }
        }
    }
    false
}

fn carry_annotations(edge_link: GraphLink, desired: GraphLinkInstance) -> GraphLinkInstance {
    let mut instance = GraphLinkInstance::plain(edge_link);
    for foot in ALL_FEET {
        for portion in ALL_PORTIONS {
            if edge_link.slot(foot, portion).is_some() {
                instance.set_annotation(foot, portion, desired.annotation(foot, portion));
            }
        }
    }
    instance
}

/// Deviation of cumulative per-lane step counts from the configured target
/// distribution, summed over arrows and divided by NumArrows.
fn distribution_cost(step_counts: &HashMap<usize, u32>, total_steps: u32, desired_weights: &[f64]) -> f64 {
    if total_steps == 0 {
        return 0.0;
    }
    let num_arrows = desired_weights.len().max(1);
    let mut deviation = 0.0;
    for (arrow, &target) in desired_weights.iter().enumerate() {
        let count = step_counts.get(&arrow).copied().unwrap_or(0);
        let observed = count as f64 / total_steps as f64;
        deviation += (observed - target).abs();
    }
    deviation / num_arrows as f64
}

fn emit_events(
    pad: &PadDescriptor,
    path: &[SearchNode],
    expressed: &ExpressedChart,
    chart_id: &ChartId,
) -> Vec<OutputEvent> {
    let mut events = Vec::new();
    let mut ever_stepped = vec![false; pad.num_arrows];
    let mut releases: Vec<(Position, usize, Option<Foot>)> = Vec::new();
    let mut taps: Vec<(Position, usize, Option<Foot>)> = Vec::new();

    for node in path {
        let Some(instance) = &node.incoming else { continue };
        for foot in ALL_FEET {
            for portion in ALL_PORTIONS {
                let Some(slot) = instance.link.slot(foot, portion) else { continue };
                let annotation = instance.annotation(foot, portion);
                match slot.action {
                    FootAction::Release => {
                        events.push(OutputEvent::LaneHoldEnd { position: node.position, lane: slot.arrow });
                        releases.push((node.position, slot.arrow, Some(foot)));
                    }
                    FootAction::Hold => {
                        ever_stepped[slot.arrow] = true;
                        let is_roll = matches!(annotation, InstanceAnnotation::Roll);
                        events.push(OutputEvent::LaneHoldStart { position: node.position, lane: slot.arrow, is_roll });
                        taps.push((node.position, slot.arrow, Some(foot)));
                    }
                    FootAction::Tap => {
                        ever_stepped[slot.arrow] = true;
                        taps.push((node.position, slot.arrow, Some(foot)));
                        events.push(match annotation {
                            InstanceAnnotation::Fake => OutputEvent::LaneFake { position: node.position, lane: slot.arrow },
                            InstanceAnnotation::Lift => OutputEvent::LaneLift { position: node.position, lane: slot.arrow },
                            _ => OutputEvent::LaneTap { position: node.position, lane: slot.arrow },
                        });
                    }
                }
            }
        }
    }

    let mut claimed_by_row: HashMap<i64, std::collections::HashSet<usize>> = HashMap::new();
    for mine in &expressed.mines {
        let claimed = claimed_by_row.entry(mine.position.row).or_default();
        let placed = match mine.mine_type {
            MineType::AfterArrow { foot, .. } => place_after(&releases, mine.position, foot, claimed),
            MineType::BeforeArrow { foot, .. } => place_before(&taps, mine.position, foot, claimed),
            MineType::NoArrow { .. } => (0..pad.num_arrows).find(|a| !ever_stepped[*a] && !claimed.contains(a)),
        };
        match placed {
            Some(lane) => {
                claimed.insert(lane);
                events.push(OutputEvent::LaneMine { position: mine.position, lane });
            }
            None => {
                warn!(chart = %chart_id, beat = mine.position.beat, "dropping a mine with no available lane");
                let _ = MinePlacementWarning { chart: chart_id.clone(), position_beat: mine.position.beat };
            }
        }
    }

    crate::events::sort_output_events(&mut events);
    events
}

fn place_after(
    releases: &[(Position, usize, Option<Foot>)],
    position: Position,
    foot: Option<Foot>,
    claimed: &std::collections::HashSet<usize>,
) -> Option<usize> {
    let mut candidates: Vec<&(Position, usize, Option<Foot>)> = releases
        .iter()
        .filter(|(p, a, f)| p.row < position.row && !claimed.contains(a) && (foot.is_none() || *f == foot))
        .collect();
    candidates.sort_by(|a, b| b.0.row.cmp(&a.0.row));
    candidates.first().map(|&&(_, arrow, _)| arrow).or_else(|| {
        releases
            .iter()
            .filter(|(p, a, _)| p.row < position.row && !claimed.contains(a))
            .max_by_key(|(p, _, _)| p.row)
            .map(|&(_, arrow, _)| arrow)
    })
}

fn place_before(
    taps: &[(Position, usize, Option<Foot>)],
    position: Position,
    foot: Option<Foot>,
    claimed: &std::collections::HashSet<usize>,
) -> Option<usize> {
    let mut candidates: Vec<&(Position, usize, Option<Foot>)> = taps
        .iter()
        .filter(|(p, a, f)| p.row > position.row && !claimed.contains(a) && (foot.is_none() || *f == foot))
        .collect();
    candidates.sort_by(|a, b| a.0.row.cmp(&b.0.row));
    candidates.first().map(|&&(_, arrow, _)| arrow).or_else(|| {
        taps.iter()
            .filter(|(p, a, _)| p.row > position.row && !claimed.contains(a))
            .min_by_key(|(p, _, _)| p.row)
            .map(|&(_, arrow, _)| arrow)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::events::InputChart;
    use crate::expressed_chart::express;
    use crate::seed::rng_for;

    fn root_tiers(graph: &StepGraph) -> Vec<Vec<NodeId>> {
        vec![vec![graph.root]]
    }

    #[test]
    fn identity_pad_round_trips_alternating_taps() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        let config = CoreConfig::default_for(pad.num_arrows);
        let cache = SubstitutionCache::build(&graph, &config);

        let chart = InputChart {
            events: vec![
                crate::events::InputEvent::LaneTap { position: Position::new(0.0, 0), lane: 0 },
                crate::events::InputEvent::LaneTap { position: Position::new(1.0, 48), lane: 1 },
                crate::events::InputEvent::LaneTap { position: Position::new(2.0, 96), lane: 2 },
                crate::events::InputEvent::LaneTap { position: Position::new(3.0, 144), lane: 3 },
            ],
        };
        let (expressed, _) = express(&chart, &graph, &pad).unwrap();

        let chart_id = ChartId { title: "t".into(), steps_type: "dance-single".into(), difficulty: "Hard".into() };
        let mut rng = rng_for("t.sm", 0);
        let performed =
            perform(&chart_id, &graph, &pad, &cache, &expressed, &root_tiers(&graph), &config, &mut rng).unwrap();
        let step_events = performed
            .events
            .iter()
            .filter(|e| matches!(e, OutputEvent::LaneTap { .. }))
            .count();
        assert_eq!(step_events, 4);
    }

    #[test]
    fn substitution_cache_always_includes_identity_replacement() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        let config = CoreConfig::default_for(pad.num_arrows);
        let cache = SubstitutionCache::build(&graph, &config);
        for link in graph.all_links() {
            assert!(cache.replacements_for(link).contains(&link));
        }
    }
}
