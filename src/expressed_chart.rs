//! ExpressedChart search: explains an [`InputChart`] as a pruned,
//! lowest-cost path of [`GraphLink`]s over an input [`StepGraph`].
//!
//! Grounded on `step_parity::StepParityGenerator`'s row-by-row frontier
//! search (`get_dp_states`, best-path backtrace via `predecessor`
//! pointers), generalised from a flat per-row DP array keyed by foot
//! placement into an explicit per-[`GraphNode`] frontier, since the
//! two-footed graph already encodes per-foot reachability the row DP had
//! to recompute from scratch at every row.

use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, ExpressionFailure};
use crate::events::{InputChart, InputEvent, MineType, Position};
use crate::pad::PadDescriptor;
use crate::step_graph::{GraphLink, GraphLinkInstance, GraphNode, InstanceAnnotation, NodeId, StepGraph};
use crate::step_types::{Foot, FootAction, FootPortion, StepType, ALL_FEET, ALL_PORTIONS};

/// One resolved step: the position it occurs at and the incoming link that
/// explains it.
#[derive(Clone, Debug)]
pub struct StepEvent {
    pub position: Position,
    pub link: GraphLinkInstance,
}

/// One classified input mine.
#[derive(Clone, Debug)]
pub struct MineEvent {
    pub position: Position,
    pub mine_type: MineType,
}

#[derive(Clone, Debug, Default)]
pub struct ExpressedChart {
    pub steps: Vec<StepEvent>,
    pub mines: Vec<MineEvent>,
}

/// What an input event at a position demands of one arrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequiredAction {
    Release,
    Tap,
    Hold { is_roll: bool },
}

#[derive(Clone)]
struct SearchNode {
    graph_node: NodeId,
    position: Position,
    cost: f64,
    parent: Option<usize>,
    incoming: Option<GraphLinkInstance>,
    run_foot: Option<Foot>,
    run_length: u8,
}

const START_POSITION: Position = Position { beat: f64::NEG_INFINITY, row: i64::MIN };

/// Explains `chart` over `graph`, returning the resolved step/mine sequence
/// plus the graph's root (the only starting state expression ever uses —
/// unlike performance, there is no tier fallback here).
pub fn express(
    chart: &InputChart,
    graph: &StepGraph,
    pad: &PadDescriptor,
) -> Result<(ExpressedChart, NodeId), CoreError> {
    let mut open_holds: HashSet<usize> = HashSet::new();
    let mut sorted: Vec<InputEvent> = chart
        .events
        .iter()
        .filter(|e| !matches!(e, InputEvent::Passthrough { .. }))
        .cloned()
        .collect();
    sorted.sort_by_key(|e| e.position());
    for event in &sorted {
        match event {
            InputEvent::LaneHoldStart { lane, .. } => {
                open_holds.insert(*lane);
            }
            InputEvent::LaneHoldEnd { lane, .. } => {
                open_holds.remove(lane);
            }
            _ => {}
        }
    }
    if let Some(&lane) = open_holds.iter().next() {
        return Err(CoreError::Expression(ExpressionFailure::UnclosedHold { lane }));
    }

    let mut arena: Vec<SearchNode> = vec![SearchNode {
        graph_node: graph.root,
        position: START_POSITION,
        cost: 0.0,
        parent: None,
        incoming: None,
        run_foot: None,
        run_length: 0,
    }];
    let mut frontier: Vec<usize> = vec![0];
    let mut mine_log: Vec<(Position, usize)> = Vec::new();

    let mut i = 0;
    while i < sorted.len() {
        let position = sorted[i].position();
        let mut releases = Vec::new();
        let mut mines = Vec::new();
        let mut steps = Vec::new();
        while i < sorted.len() && sorted[i].position() == position {
            match &sorted[i] {
                InputEvent::LaneHoldEnd { lane, .. } => releases.push(*lane),
                InputEvent::LaneMine { lane, .. } => mines.push(*lane),
                InputEvent::LaneTap { lane, .. } => steps.push((*lane, RequiredAction::Tap)),
                InputEvent::LaneHoldStart { lane, is_roll, .. } => {
                    steps.push((*lane, RequiredAction::Hold { is_roll: *is_roll }))
                }
                InputEvent::Passthrough { .. } => {}
            }
            i += 1;
        }
        for lane in &mines {
            mine_log.push((position, *lane));
        }
        if releases.is_empty() && steps.is_empty() {
            continue;
        }

        let mut required: HashMap<usize, RequiredAction> = HashMap::new();
        for lane in &releases {
            required.insert(*lane, RequiredAction::Release);
        }
        for &(lane, action) in &steps {
            required.insert(lane, action);
        }

        let hinted: HashSet<usize> = mine_log
            .iter()
            .filter(|(p, _)| p.row <= position.row)
            .map(|(_, lane)| *lane)
            .collect();

        let mut candidates: Vec<SearchNode> = Vec::new();
        for &parent_idx in &frontier {
            let src = *graph.node(arena[parent_idx].graph_node);
            for &(link, dest_id) in graph.links_from(arena[parent_idx].graph_node) {
                let Some(instance) = matches_required(&link, &required) else { continue };
                let dest = *graph.node(dest_id);
                let (cost, run_foot, run_length) =
                    link_cost(pad, &src, &dest, &link, &arena[parent_idx], &hinted);
                candidates.push(SearchNode {
                    graph_node: dest_id,
                    position,
                    cost: arena[parent_idx].cost + cost,
                    parent: Some(parent_idx),
                    incoming: Some(instance),
                    run_foot,
                    run_length,
                });
            }
        }
        if candidates.is_empty() {
            return Err(CoreError::Expression(ExpressionFailure::NoMatchingPath { beat: position.beat }));
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
        .iter()
        .copied()
        .min_by(|&a, &b| arena[a].cost.partial_cmp(&arena[b].cost).unwrap())
        .unwrap_or(0);

    let mut steps_rev = Vec::new();
    let mut cur = best_final;
    while let Some(parent) = arena[cur].parent {
        steps_rev.push(StepEvent { position: arena[cur].position, link: arena[cur].incoming.clone().unwrap() });
        cur = parent;
    }
    steps_rev.reverse();

    let mines = express_mines(&steps_rev, &mine_log);
    Ok((ExpressedChart { steps: steps_rev, mines }, graph.root))
}

fn matches_required(link: &GraphLink, required: &HashMap<usize, RequiredAction>) -> Option<GraphLinkInstance> {
    let mut touched: HashMap<usize, (Foot, FootPortion, FootAction)> = HashMap::new();
    for foot in ALL_FEET {
        for portion in ALL_PORTIONS {
            if let Some(slot) = link.slot(foot, portion) {
                touched.insert(slot.arrow, (foot, portion, slot.action));
            }
        }
    }
    if touched.len() != required.len() {
        return None;
    }
    for (&arrow, req) in required {
        let Some(&(_, _, action)) = touched.get(&arrow) else { return None };
        let ok = match req {
            RequiredAction::Release => action == FootAction::Release,
            RequiredAction::Tap => action == FootAction::Tap,
            RequiredAction::Hold { .. } => action == FootAction::Hold,
        };
        if !ok {
            return None;
        }
    }

    let mut instance = GraphLinkInstance::plain(*link);
    for foot in ALL_FEET {
        for portion in ALL_PORTIONS {
            if let Some(slot) = link.slot(foot, portion) {
                if let Some(RequiredAction::Hold { is_roll: true }) = required.get(&slot.arrow) {
                    instance.set_annotation(foot, portion, InstanceAnnotation::Roll);
                }
            }
        }
    }
    Some(instance)
}

const COST_RELEASE: f64 = 0.0;
const COST_SAME_ARROW: f64 = 1.0;
const COST_SAME_ARROW_OTHER_FREE: f64 = 3.0;
const COST_NEW_ARROW_ALTERNATE: f64 = 1.0;
const COST_NEW_ARROW_DOUBLE_STEP: f64 = 6.0;
const COST_NEW_ARROW_DOUBLE_STEP_HINTED: f64 = 3.0;
const COST_NEW_ARROW_TRIPLE_STEP: f64 = 12.0;
const COST_CROSSOVER: f64 = 3.0;
const COST_CROSSOVER_DOUBLE_STEP_UNHINTED: f64 = 9.0;
const COST_INVERT: f64 = 4.0;
const COST_INVERT_UNHINTED: f64 = 8.0;
const COST_INVERT_AFTER_FOOTSWAP: f64 = 14.0;
const COST_FOOTSWAP_HINTED: f64 = 1.5;
const COST_FOOTSWAP_CHAINED: f64 = 1.5;
const COST_FOOTSWAP_UNHINTED: f64 = 7.0;
const COST_FOOTSWAP_DOUBLE_STEP_UNHINTED: f64 = 13.0;
const COST_BRACKET_FORCED: f64 = 1.0;
const COST_BRACKET_PREFERRED: f64 = 2.0;
const COST_BRACKET_DEFAULT: f64 = 3.5;
const COST_BRACKET_DOUBLE_STEP: f64 = 8.0;
const COST_BRACKET_RETAP: f64 = 0.5;
const COST_JUMP_BOTH_SAME: f64 = 0.5;
const COST_JUMP_BOTH_NEW: f64 = 1.5;
const COST_JUMP_ONE_BRACKETABLE: f64 = 2.5;
const COST_JUMP_TWO_BRACKETABLE: f64 = 3.5;
const COST_MULTI_ARROW_FLAT: f64 = 1.0;

/// Feet that take a non-release action in `link`, with the arrows each acts
/// on. Feet that only release contribute nothing here (`is_release` slots
/// are handled separately as always-zero-cost).
fn stepping_feet(link: &GraphLink) -> Vec<(Foot, StepType, Vec<usize>)> {
    let mut out = Vec::new();
    for foot in ALL_FEET {
        let mut arrows = Vec::new();
        let mut step_type = None;
        let mut any_non_release = false;
        for portion in ALL_PORTIONS {
            if let Some(slot) = link.slot(foot, portion) {
                if slot.action != FootAction::Release {
                    any_non_release = true;
                    if !arrows.contains(&slot.arrow) {
                        arrows.push(slot.arrow);
                    }
                    step_type = Some(slot.step_type);
                }
            }
        }
        if any_non_release {
            out.push((foot, step_type.unwrap(), arrows));
        }
    }
    out
}

/// Computes this link's additive cost and the (run_foot, run_length) the
/// resulting SearchNode should carry for future double/triple-step
/// detection.
fn link_cost(
    pad: &PadDescriptor,
    src: &GraphNode,
    dest: &GraphNode,
    link: &GraphLink,
    parent: &SearchNode,
    mine_hinted_arrows: &HashSet<usize>,
) -> (f64, Option<Foot>, u8) {
    let stepping = stepping_feet(link);
    let total_arrows: usize = stepping.iter().map(|(_, _, arrows)| arrows.len()).sum();

    match (stepping.len(), total_arrows) {
        (0, _) => (COST_RELEASE, parent.run_foot, parent.run_length),
        (1, 1) => {
            let (foot, step_type, arrows) = &stepping[0];
            let target = arrows[0];
            let is_double = parent.run_foot == Some(*foot);
            let is_triple = is_double && parent.run_length >= 2;
            let hinted = mine_hinted_arrows.contains(&target);
            let cost = match step_type {
                StepType::SameArrow => {
                    let other = GraphNode::other_foot(*foot);
                    if !src.foot_is_holding(*foot) && !dest.foot_is_holding(other) && !src.foot_is_holding(other) {
                        COST_SAME_ARROW
                    } else {
                        COST_SAME_ARROW_OTHER_FREE
                    }
                }
                StepType::NewArrow => {
                    if is_triple {
                        COST_NEW_ARROW_TRIPLE_STEP
                    } else if is_double {
                        if hinted {
                            COST_NEW_ARROW_DOUBLE_STEP_HINTED
                        } else {
                            COST_NEW_ARROW_DOUBLE_STEP
                        }
                    } else {
                        COST_NEW_ARROW_ALTERNATE
                    }
                }
                StepType::CrossoverFront | StepType::CrossoverBehind => {
                    if is_double && !hinted {
                        COST_CROSSOVER_DOUBLE_STEP_UNHINTED
                    } else {
                        COST_CROSSOVER
                    }
                }
                StepType::InvertFront | StepType::InvertBehind => {
                    if matches!(parent.incoming_step_type(), Some(StepType::FootSwap)) {
                        COST_INVERT_AFTER_FOOTSWAP
                    } else if hinted {
                        COST_INVERT
                    } else {
                        COST_INVERT_UNHINTED
                    }
                }
                StepType::FootSwap => {
                    let chained = matches!(parent.incoming_step_type(), Some(StepType::FootSwap));
                    if chained {
                        COST_FOOTSWAP_CHAINED
                    } else if hinted {
                        COST_FOOTSWAP_HINTED
                    } else if is_double {
                        COST_FOOTSWAP_DOUBLE_STEP_UNHINTED
                    } else {
                        COST_FOOTSWAP_UNHINTED
                    }
                }
                _ => COST_NEW_ARROW_ALTERNATE,
            };
            let moving = !matches!(step_type, StepType::SameArrow);
            let (run_foot, run_length) = if moving {
                if is_double {
                    (Some(*foot), parent.run_length + 1)
                } else {
                    (Some(*foot), 1)
                }
            } else {
                (None, 0)
            };
            (cost, run_foot, run_length)
        }
        (1, 2) => {
            let (foot, step_type, arrows) = &stepping[0];
            let other = GraphNode::other_foot(*foot);
            let is_retap = matches!(step_type, StepType::BracketHeelSameToeSame);
            let other_forces_it = src.foot_is_holding(other);
            let is_double = parent.run_foot == Some(*foot);
            let cost = if is_retap {
                COST_BRACKET_RETAP
            } else if other_forces_it {
                COST_BRACKET_FORCED
            } else if is_double {
                COST_BRACKET_DOUBLE_STEP
            } else if !src.foot_is_holding(other) && arrows.iter().any(|&a| !src.foot_occupies(*foot, a)) {
                COST_BRACKET_PREFERRED
            } else {
                COST_BRACKET_DEFAULT
            };
            (cost, None, 0)
        }
        (2, 2) => {
            let (fa, ta, aa) = &stepping[0];
            let (fb, tb, ab) = &stepping[1];
            let both_same = matches!(ta, StepType::SameArrow) && matches!(tb, StepType::SameArrow);
            let cost = if both_same {
                COST_JUMP_BOTH_SAME
            } else {
                let bracketable = |a: usize, b: usize| {
                    crate::pad::mask_contains(pad.arrow_data[a].bracketable_with_other_heel, b)
                        || crate::pad::mask_contains(pad.arrow_data[a].bracketable_with_other_toe, b)
                };
                let close = bracketable(aa[0], ab[0]);
                let both_new = !matches!(ta, StepType::SameArrow) && !matches!(tb, StepType::SameArrow);
                if both_new && !close {
                    COST_JUMP_BOTH_NEW
                } else if close && !both_new {
                    COST_JUMP_ONE_BRACKETABLE
                } else {
                    COST_JUMP_TWO_BRACKETABLE
                }
            };
            let _ = (fa, fb);
            (cost, None, 0)
        }
        _ => (COST_MULTI_ARROW_FLAT, None, 0),
    }
}

impl SearchNode {
    fn incoming_step_type(&self) -> Option<StepType> {
        let instance = self.incoming.as_ref()?;
        for foot in ALL_FEET {
            for portion in ALL_PORTIONS {
                if let Some(slot) = instance.link.slot(foot, portion) {
                    if slot.action != FootAction::Release {
                        return Some(slot.step_type);
                    }
                }
            }
        }
        None
    }
}

/// Post-hoc mine classification: walk the resolved path's release/step log
/// and pair each buffered mine with the nearest unclaimed arrow per spec's
/// AfterArrow/BeforeArrow/NoArrow recipe.
fn express_mines(steps: &[StepEvent], mine_log: &[(Position, usize)]) -> Vec<MineEvent> {
    let mut releases: Vec<(Position, usize, Option<Foot>)> = Vec::new();
    let mut taps: Vec<(Position, usize, Option<Foot>)> = Vec::new();
    for event in steps {
        for foot in ALL_FEET {
            for portion in ALL_PORTIONS {
                if let Some(slot) = event.link.link.slot(foot, portion) {
                    match slot.action {
                        FootAction::Release => releases.push((event.position, slot.arrow, Some(foot))),
                        FootAction::Tap | FootAction::Hold => taps.push((event.position, slot.arrow, Some(foot))),
                    }
                }
            }
        }
    }

    let mut claimed_by_row: HashMap<i64, HashSet<usize>> = HashMap::new();
    let mut out = Vec::with_capacity(mine_log.len());
    for &(position, lane) in mine_log {
        let claimed = claimed_by_row.entry(position.row).or_default();

        let mut after: Vec<(Position, usize, Option<Foot>)> = releases
            .iter()
            .copied()
            .filter(|(p, a, _)| p.row < position.row && !claimed.contains(a))
            .collect();
        after.sort_by(|a, b| b.0.row.cmp(&a.0.row));
        if let Some(&(_, arrow, foot)) = after.first() {
            claimed.insert(arrow);
            out.push(MineEvent {
                position,
                mine_type: MineType::AfterArrow { n: 1, foot, original_arrow: lane },
            });
            continue;
        }

        let mut before: Vec<(Position, usize, Option<Foot>)> = taps
            .iter()
            .copied()
            .filter(|(p, a, _)| p.row > position.row && !claimed.contains(a))
            .collect();
        before.sort_by(|a, b| a.0.row.cmp(&b.0.row));
        if let Some(&(_, arrow, foot)) = before.first() {
            claimed.insert(arrow);
            out.push(MineEvent {
                position,
                mine_type: MineType::BeforeArrow { n: 1, foot, original_arrow: lane },
            });
            continue;
        }

        out.push(MineEvent { position, mine_type: MineType::NoArrow { original_arrow: lane } });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InputChart;

    fn tap(row: i64, lane: usize) -> InputEvent {
        InputEvent::LaneTap { position: Position::new(row as f64 / 48.0, row), lane }
    }

    #[test]
    fn empty_chart_expresses_to_empty_path() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        let chart = InputChart::default();
        let (expressed, root) = express(&chart, &graph, &pad).unwrap();
        assert!(expressed.steps.is_empty());
        assert!(expressed.mines.is_empty());
        assert_eq!(root, graph.root);
    }

    #[test]
    fn alternating_taps_resolve_to_one_step_per_event() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        let chart = InputChart { events: vec![tap(0, 0), tap(48, 1), tap(96, 2), tap(144, 3)] };
        let (expressed, _) = express(&chart, &graph, &pad).unwrap();
        assert_eq!(expressed.steps.len(), 4);
    }

    #[test]
    fn unclosed_hold_is_rejected() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        let chart = InputChart {
            events: vec![InputEvent::LaneHoldStart { position: Position::new(0.0, 0), lane: 0, is_roll: false }],
        };
        let err = express(&chart, &graph, &pad).unwrap_err();
        assert!(matches!(err, CoreError::Expression(ExpressionFailure::UnclosedHold { lane: 0 })));
    }
}
