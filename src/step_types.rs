//! The step catalogue: [`StepType`], [`FootAction`], and the fill
//! predicates that, given a source [`GraphNode`], enumerate the legal
//! destination states for every step a foot can take.
//!
//! Grounded on `step_parity.rs`'s `Foot` enum and its per-row legality
//! checks (`get_foot_placement_permutations`, `permute_recursive`),
//! generalised from "legal placements for one chart row" into "legal
//! transitions out of any body state," which is what lets [`crate::step_graph`]
//! build the persistent graph once per pad instead of once per chart.

use std::collections::HashSet;

use crate::pad::{mask_contains, PadDescriptor};
use crate::step_graph::{
    BodyOrientation, FootArrowState, GraphArrowState, GraphLink, GraphNode, LinkSlot,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Foot {
    Left = 0,
    Right = 1,
}

pub const ALL_FEET: [Foot; 2] = [Foot::Left, Foot::Right];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FootPortion {
    Heel = 0,
    Toe = 1,
}

pub const ALL_PORTIONS: [FootPortion; 2] = [FootPortion::Heel, FootPortion::Toe];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FootAction {
    Tap,
    Hold,
    Release,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepType {
    SameArrow,
    NewArrow,
    CrossoverFront,
    CrossoverBehind,
    InvertFront,
    InvertBehind,
    FootSwap,
    BracketHeelNewToeNew,
    BracketHeelNewToeSame,
    BracketHeelSameToeNew,
    BracketHeelSameToeSame,
    BracketOneArrowHeelSame,
    BracketOneArrowHeelNew,
    BracketOneArrowToeSame,
    BracketOneArrowToeNew,
}

pub const ALL_STEP_TYPES: [StepType; 15] = [
    StepType::SameArrow,
    StepType::NewArrow,
    StepType::CrossoverFront,
    StepType::CrossoverBehind,
    StepType::InvertFront,
    StepType::InvertBehind,
    StepType::FootSwap,
    StepType::BracketHeelNewToeNew,
    StepType::BracketHeelNewToeSame,
    StepType::BracketHeelSameToeNew,
    StepType::BracketHeelSameToeSame,
    StepType::BracketOneArrowHeelSame,
    StepType::BracketOneArrowHeelNew,
    StepType::BracketOneArrowToeSame,
    StepType::BracketOneArrowToeNew,
];

/// Per-`StepType` static facts used both by graph construction and by the
/// search cost models.
#[derive(Clone, Copy, Debug)]
pub struct StepTypeInfo {
    pub arity: u8,
    pub usable_in_jump: bool,
    pub only_consider_current_arrows_when_filling: bool,
    pub is_release: bool,
    pub is_foot_swap: bool,
    pub is_bracket: bool,
}

impl StepType {
    /// Parses a catalogue-entry name as used in TOML configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_STEP_TYPES.iter().copied().find(|st| st.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            StepType::SameArrow => "SameArrow",
            StepType::NewArrow => "NewArrow",
            StepType::CrossoverFront => "CrossoverFront",
            StepType::CrossoverBehind => "CrossoverBehind",
            StepType::InvertFront => "InvertFront",
            StepType::InvertBehind => "InvertBehind",
            StepType::FootSwap => "FootSwap",
            StepType::BracketHeelNewToeNew => "BracketHeelNewToeNew",
            StepType::BracketHeelNewToeSame => "BracketHeelNewToeSame",
            StepType::BracketHeelSameToeNew => "BracketHeelSameToeNew",
            StepType::BracketHeelSameToeSame => "BracketHeelSameToeSame",
            StepType::BracketOneArrowHeelSame => "BracketOneArrowHeelSame",
            StepType::BracketOneArrowHeelNew => "BracketOneArrowHeelNew",
            StepType::BracketOneArrowToeSame => "BracketOneArrowToeSame",
            StepType::BracketOneArrowToeNew => "BracketOneArrowToeNew",
        }
    }
}

pub fn step_type_info(step_type: StepType) -> StepTypeInfo {
    use StepType::*;
    match step_type {
        SameArrow => StepTypeInfo {
            arity: 1,
            usable_in_jump: true,
            only_consider_current_arrows_when_filling: true,
            is_release: true,
            is_foot_swap: false,
            is_bracket: false,
        },
        NewArrow => StepTypeInfo {
            arity: 1,
            usable_in_jump: true,
            only_consider_current_arrows_when_filling: false,
            is_release: false,
            is_foot_swap: false,
            is_bracket: false,
        },
        CrossoverFront | CrossoverBehind | InvertFront | InvertBehind => StepTypeInfo {
            arity: 1,
            usable_in_jump: true,
            only_consider_current_arrows_when_filling: false,
            is_release: false,
            is_foot_swap: false,
            is_bracket: false,
        },
        FootSwap => StepTypeInfo {
            arity: 1,
            usable_in_jump: true,
            only_consider_current_arrows_when_filling: false,
            is_release: false,
            is_foot_swap: true,
            is_bracket: false,
        },
        BracketHeelSameToeSame => StepTypeInfo {
            arity: 2,
            usable_in_jump: true,
            only_consider_current_arrows_when_filling: true,
            is_release: true,
            is_foot_swap: false,
            is_bracket: true,
        },
        BracketHeelNewToeNew
        | BracketHeelNewToeSame
        | BracketHeelSameToeNew
        | BracketOneArrowHeelSame
        | BracketOneArrowHeelNew
        | BracketOneArrowToeSame
        | BracketOneArrowToeNew => StepTypeInfo {
            arity: 2,
            usable_in_jump: true,
            only_consider_current_arrows_when_filling: false,
            is_release: false,
            is_foot_swap: false,
            is_bracket: true,
        },
    }
}

fn occupied_arrows(node: &GraphNode, foot: Foot) -> Vec<usize> {
    let portions = node.foot_portions(foot);
    let mut out = Vec::with_capacity(2);
    for p in portions {
        if let Some(a) = p.arrow {
            if !out.contains(&a) {
                out.push(a);
            }
        }
    }
    out
}

/// Builds the destination node for a step that places one portion of
/// `foot` on `arrow`, carrying the foot's other portion forward as `carry`
/// rather than discarding it. A foot resting on two arrows at once (a
/// bracket) keeps its untouched arrow occupied when only one portion
/// steps; callers that genuinely lift the whole foot pass
/// `FootArrowState::INVALID` explicitly.
fn single_arrow_destination(
    node: &GraphNode,
    foot: Foot,
    arrow: usize,
    state: GraphArrowState,
    orientation: BodyOrientation,
    carry: FootArrowState,
) -> GraphNode {
    let new_state = FootArrowState { arrow: Some(arrow), state };
    node.with_foot_portions(foot, [new_state, carry])
        .with_orientation(orientation)
}

/// The portion of `foot` other than the one currently resting on
/// `acted_arrow`, so a move or retap of one portion can carry the
/// sibling's state forward undisturbed.
fn sibling_portion_state(node: &GraphNode, foot: Foot, acted_arrow: usize) -> FootArrowState {
    let portions = node.foot_portions(foot);
    if portions[0].arrow == Some(acted_arrow) {
        portions[1]
    } else {
        portions[0]
    }
}

/// SameArrow tap/hold/release: re-tapping, holding, or releasing the arrow
/// a foot already occupies.
fn same_arrow_steps(node: &GraphNode, foot: Foot) -> Vec<(GraphLink, GraphNode)> {
    let other = GraphNode::other_foot(foot);
    let mut out = Vec::new();
    let portions = node.foot_portions(foot);

    // Release: exactly one portion Held, the other portion unoccupied.
    for (idx, portion) in ALL_PORTIONS.into_iter().enumerate() {
        let fp = portions[idx];
        if fp.is_valid() && fp.is_held() {
            let other_idx = 1 - idx;
            if !portions[other_idx].is_valid() {
                let dest = single_arrow_destination(
                    node,
                    foot,
                    fp.arrow.unwrap(),
                    GraphArrowState::Resting,
                    node.orientation,
                    portions[other_idx],
                );
                let link = GraphLink::single(
                    foot,
                    portion,
                    LinkSlot {
                        step_type: StepType::SameArrow,
                        action: FootAction::Release,
                        arrow: fp.arrow.unwrap(),
                    },
                );
                out.push((link, dest));
            }
        }
    }

    // Tap/Hold: foot not currently holding anything, and the other foot
    // isn't resting on the same arrow (forbids paradiddle patterns).
    if !node.foot_is_holding(foot) {
        for (idx, portion) in ALL_PORTIONS.into_iter().enumerate() {
            let fp = portions[idx];
            if fp.is_valid() && !fp.is_held() {
                let arrow = fp.arrow.unwrap();
                if node.foot_rests_on(other, arrow) {
                    continue;
                }
                for action in [FootAction::Tap, FootAction::Hold] {
                    let state = if action == FootAction::Hold {
                        GraphArrowState::Held
                    } else {
                        GraphArrowState::Resting
                    };
                    let dest = single_arrow_destination(
                        node,
                        foot,
                        arrow,
                        state,
                        node.orientation,
                        portions[1 - idx],
                    );
                    let link = GraphLink::single(
                        foot,
                        portion,
                        LinkSlot { step_type: StepType::SameArrow, action, arrow },
                    );
                    out.push((link, dest));
                }
            }
        }
    }

    out
}

/// NewArrow / CrossoverFront / CrossoverBehind / InvertFront / InvertBehind
/// / FootSwap: a foot moves to an arrow it does not currently occupy.
fn moving_steps(pad: &PadDescriptor, node: &GraphNode, foot: Foot) -> Vec<(GraphLink, GraphNode)> {
    let other = GraphNode::other_foot(foot);
    if node.foot_is_holding(foot) {
        return Vec::new();
    }
    let current = match occupied_arrows(node, foot).first().copied() {
        Some(a) => a,
        None => return Vec::new(),
    };
    let sibling = sibling_portion_state(node, foot, current);
    let other_arrows = occupied_arrows(node, other);
    let other_primary = match other_arrows.first().copied() {
        Some(a) => a,
        None => return Vec::new(),
    };

    let mut out = Vec::new();
    for target in 0..pad.num_arrows {
        if target == current {
            continue;
        }
        // A bracketed foot's untouched portion carries forward; don't land
        // the moving portion on top of it.
        if sibling.is_valid() && sibling.arrow == Some(target) {
            continue;
        }
        if !mask_contains(pad.arrow_data[current].valid_next, target) {
            continue;
        }

        if node.foot_occupies(other, target) {
            // Only a FootSwap may land on an arrow the other foot holds, and
            // only while neither foot is holding.
            if node.foot_rests_on(other, target) && !node.foot_is_holding(other) {
                for action in [FootAction::Tap, FootAction::Hold] {
                    let state = if action == FootAction::Hold {
                        GraphArrowState::Held
                    } else {
                        GraphArrowState::Resting
                    };
                    let dest = single_arrow_destination(
                        node,
                        foot,
                        target,
                        state,
                        BodyOrientation::Normal,
                        sibling,
                    );
                    let link = GraphLink::single(
                        foot,
                        FootPortion::Heel,
                        LinkSlot { step_type: StepType::FootSwap, action, arrow: target },
                    );
                    out.push((link, dest));
                }
            }
            continue;
        }

        let data = &pad.arrow_data[target];
        let (step_type, orientation) = if mask_contains(data.crossover_front, other_primary) {
            (StepType::CrossoverFront, node.orientation)
        } else if mask_contains(data.crossover_behind, other_primary) {
            (StepType::CrossoverBehind, node.orientation)
        } else if mask_contains(data.invert_front, other_primary) {
            let o = match foot {
                Foot::Left => BodyOrientation::InvertedLeftOverRight,
                Foot::Right => BodyOrientation::InvertedRightOverLeft,
            };
            if node.orientation != BodyOrientation::Normal && node.orientation != o {
                continue;
            }
            (StepType::InvertFront, o)
        } else if mask_contains(data.invert_behind, other_primary) {
            let o = match foot {
                Foot::Left => BodyOrientation::InvertedRightOverLeft,
                Foot::Right => BodyOrientation::InvertedLeftOverRight,
            };
            if node.orientation != BodyOrientation::Normal && node.orientation != o {
                continue;
            }
            (StepType::InvertBehind, o)
        } else if mask_contains(data.other_foot_pairing, other_primary) {
            (StepType::NewArrow, node.orientation)
        } else {
            continue;
        };

        for action in [FootAction::Tap, FootAction::Hold] {
            let state = if action == FootAction::Hold {
                GraphArrowState::Held
            } else {
                GraphArrowState::Resting
            };
            let dest = single_arrow_destination(
                node,
                foot,
                target,
                state,
                orientation,
                sibling,
            );
            let link = GraphLink::single(
                foot,
                FootPortion::Heel,
                LinkSlot { step_type, action, arrow: target },
            );
            out.push((link, dest));
        }
    }
    out
}

/// Bracket steps: both portions of one foot land together.
fn bracket_steps(
    pad: &PadDescriptor,
    node: &GraphNode,
    foot: Foot,
    max_bracket_separation: usize,
) -> Vec<(GraphLink, GraphNode)> {
    let other = GraphNode::other_foot(foot);
    if node.foot_is_holding(foot) {
        return Vec::new();
    }
    let current = occupied_arrows(node, foot);
    let mut out = Vec::new();

    for heel in 0..pad.num_arrows {
        for toe in 0..pad.num_arrows {
            if heel == toe {
                continue;
            }
            let (lo, hi) = (heel.min(toe), heel.max(toe));
            if hi - lo > max_bracket_separation {
                continue;
            }
            if !mask_contains(pad.arrow_data[heel].bracketable_with_other_toe, toe) {
                continue;
            }
            // Both arrows must be a valid pairing for some other-foot arrow,
            // and those pairing sets must overlap, or the other foot would
            // have nowhere on the pad it could stand relative to this
            // bracket.
            if pad.arrow_data[heel].other_foot_pairing == 0 || pad.arrow_data[toe].other_foot_pairing == 0 {
                continue;
            }
            if pad.arrow_data[heel].other_foot_pairing & pad.arrow_data[toe].other_foot_pairing == 0 {
                continue;
            }
            if node.foot_occupies(other, heel) || node.foot_occupies(other, toe) {
                continue;
            }
            // At least one landing arrow must be reachable from the foot's
            // current position, and at least one must pair with the other
            // foot so the stance remains reachable from its side too.
            let reachable = current.iter().any(|&c| {
                mask_contains(pad.arrow_data[c].valid_next, heel)
                    || mask_contains(pad.arrow_data[c].valid_next, toe)
            }) || current.is_empty();
            if !reachable {
                continue;
            }

            let step_type = match current.len() {
                2 if current.contains(&heel) && current.contains(&toe) => {
                    StepType::BracketHeelSameToeSame
                }
                2 if current.contains(&heel) => StepType::BracketHeelSameToeNew,
                2 if current.contains(&toe) => StepType::BracketHeelNewToeSame,
                2 => StepType::BracketHeelNewToeNew,
                1 if current[0] == heel => StepType::BracketOneArrowHeelSame,
                1 if current[0] == toe => StepType::BracketOneArrowToeSame,
                0 => StepType::BracketHeelNewToeNew,
                _ => continue,
            };

            for action in [FootAction::Tap, FootAction::Hold] {
                let state = if action == FootAction::Hold {
                    GraphArrowState::Held
                } else {
                    GraphArrowState::Resting
                };
                let heel_state = FootArrowState { arrow: Some(heel), state };
                let toe_state = FootArrowState { arrow: Some(toe), state };
                let dest = node
                    .with_foot_portions(foot, [heel_state, toe_state])
                    .with_orientation(node.orientation);
                let link = GraphLink::bracket(
                    foot,
                    LinkSlot { step_type, action, arrow: heel },
                    LinkSlot { step_type, action, arrow: toe },
                );
                out.push((link, dest));
            }
        }
    }

    out
}

fn foot_steps(
    pad: &PadDescriptor,
    node: &GraphNode,
    foot: Foot,
    max_bracket_separation: usize,
) -> Vec<(GraphLink, GraphNode)> {
    let mut out = same_arrow_steps(node, foot);
    out.extend(moving_steps(pad, node, foot));
    out.extend(bracket_steps(pad, node, foot, max_bracket_separation));
    out
}

/// All single-foot and two-foot (jump) transitions out of `node`.
///
/// Jumps are built by running one foot's fill to produce an intermediate
/// state and the second foot's fill on that intermediate, in both foot
/// orderings — required because a NewArrow+NewArrow jump between
/// non-adjacent states is missed if the second foot can't yet occupy its
/// target while the first foot still occupies its source.
pub fn enumerate_transitions(
    pad: &PadDescriptor,
    node: &GraphNode,
    max_bracket_separation: usize,
) -> Vec<(GraphLink, GraphNode)> {
    let mut seen: HashSet<(GraphLink, GraphNode)> = HashSet::new();
    let mut out = Vec::new();

    let left_steps = foot_steps(pad, node, Foot::Left, max_bracket_separation);
    let right_steps = foot_steps(pad, node, Foot::Right, max_bracket_separation);

    for &(link, dest) in left_steps.iter().chain(right_steps.iter()) {
        if seen.insert((link, dest)) {
            out.push((link, dest));
        }
    }

    for &(link_first, intermediate) in &left_steps {
        let Some(slot) = link_first.slot(Foot::Left, FootPortion::Heel) else { continue };
        if !step_type_info(slot.step_type).usable_in_jump {
            continue;
        }
        for &(link_second, dest) in &foot_steps(pad, &intermediate, Foot::Right, max_bracket_separation) {
            let Some(slot2) = link_second.slot(Foot::Right, FootPortion::Heel) else { continue };
            if !step_type_info(slot2.step_type).usable_in_jump {
                continue;
            }
            let merged = GraphLink::merge(link_first, link_second);
            if seen.insert((merged, dest)) {
                out.push((merged, dest));
            }
        }
    }

    for &(link_first, intermediate) in &right_steps {
        let Some(slot) = link_first.slot(Foot::Right, FootPortion::Heel) else { continue };
        if !step_type_info(slot.step_type).usable_in_jump {
            continue;
        }
        for &(link_second, dest) in &foot_steps(pad, &intermediate, Foot::Left, max_bracket_separation) {
            let Some(slot2) = link_second.slot(Foot::Left, FootPortion::Heel) else { continue };
            if !step_type_info(slot2.step_type).usable_in_jump {
                continue;
            }
            let merged = GraphLink::merge(link_first, link_second);
            if seen.insert((merged, dest)) {
                out.push((merged, dest));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::PadDescriptor;
    use crate::step_graph::StepGraph;

    #[test]
    fn root_allows_new_arrow_and_same_arrow() {
        let pad = PadDescriptor::dance_single();
        let root = GraphNode::root(&pad);
        let transitions = enumerate_transitions(&pad, &root, 1);
        let has_new_arrow = transitions.iter().any(|(link, _)| {
            ALL_FEET.iter().any(|&f| {
                ALL_PORTIONS
                    .iter()
                    .any(|&p| matches!(link.slot(f, p), Some(s) if s.step_type == StepType::NewArrow))
            })
        });
        assert!(has_new_arrow, "root must admit at least one NewArrow step");
    }

    #[test]
    fn jump_order_completeness_both_orderings_reach_same_destinations() {
        let pad = PadDescriptor::dance_single();
        let root = GraphNode::root(&pad);

        let single_foot_destinations: HashSet<GraphNode> = foot_steps(&pad, &root, Foot::Left, 1)
            .iter()
            .chain(foot_steps(&pad, &root, Foot::Right, 1).iter())
            .map(|&(_, dest)| dest)
            .collect();

        let transitions = enumerate_transitions(&pad, &root, 1);
        let jump_destinations: HashSet<GraphNode> = transitions
            .iter()
            .filter(|(link, _)| ALL_FEET.iter().all(|&f| link.foot_acts(f)))
            .map(|&(_, dest)| dest)
            .collect();

        assert!(
            jump_destinations.iter().any(|dest| !single_foot_destinations.contains(dest)),
            "merging both foot orderings must reach jump destinations neither single-foot pass reaches alone"
        );
    }
}
