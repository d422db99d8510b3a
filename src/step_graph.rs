//! The two-footed body-state graph: [`GraphNode`], [`GraphLink`],
//! [`GraphLinkInstance`], and the [`StepGraph`] that BFS-enumerates every
//! reachable state on a pad and the transitions between them.
//!
//! Grounded on `step_parity::StepParityGenerator::build_state_graph`, which
//! arena-allocates `StepParityNode`s per chart row. This generalises that
//! per-chart construction into a single persistent graph built once per
//! pad and shared by every chart performed on it.

use std::collections::{HashMap, VecDeque};

use crate::pad::PadDescriptor;
use crate::step_types::{self, Foot, FootAction, FootPortion, StepType, ALL_FEET, ALL_PORTIONS};

/// Whether a foot-portion is resting or actively holding its arrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphArrowState {
    Resting,
    Held,
}

/// One foot-portion's placement, or the sentinel *Invalid* state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FootArrowState {
    pub arrow: Option<usize>,
    pub state: GraphArrowState,
}

impl FootArrowState {
    pub const INVALID: Self = Self { arrow: None, state: GraphArrowState::Resting };

    pub fn resting(arrow: usize) -> Self {
        Self { arrow: Some(arrow), state: GraphArrowState::Resting }
    }

    pub fn held(arrow: usize) -> Self {
        Self { arrow: Some(arrow), state: GraphArrowState::Held }
    }

    pub fn is_valid(self) -> bool {
        self.arrow.is_some()
    }

    pub fn is_held(self) -> bool {
        matches!(self.state, GraphArrowState::Held)
    }
}

/// Torso orientation relative to the feet. Only changes across
/// invert/cross/footswap transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyOrientation {
    Normal,
    InvertedLeftOverRight,
    InvertedRightOverLeft,
}

/// A full two-footed body state: each foot's two portions plus orientation.
///
/// Canonical form: for a fixed foot, if both portions are occupied the
/// lower arrow index is stored in portion 0. Equality and hashing operate
/// on this canonical form, so two differently-ordered bracket placements
/// of the same pair of arrows compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphNode {
    portions: [[FootArrowState; 2]; 2],
    pub orientation: BodyOrientation,
}

impl GraphNode {
    pub fn new(mut portions: [[FootArrowState; 2]; 2], orientation: BodyOrientation) -> Self {
        for foot_portions in &mut portions {
            let (p0, p1) = (foot_portions[0], foot_portions[1]);
            if let (Some(a0), Some(a1)) = (p0.arrow, p1.arrow) {
                if a1 < a0 {
                    foot_portions.swap(0, 1);
                }
            } else if p0.arrow.is_none() && p1.arrow.is_some() {
                foot_portions.swap(0, 1);
            }
        }
        Self { portions, orientation }
    }

    pub fn root(pad: &PadDescriptor) -> Self {
        let mut portions = [[FootArrowState::INVALID; 2]; 2];
        portions[Foot::Left as usize][0] = FootArrowState::resting(pad.left_start_arrow);
        portions[Foot::Right as usize][0] = FootArrowState::resting(pad.right_start_arrow);
        Self::new(portions, BodyOrientation::Normal)
    }

    #[inline]
    pub fn portion(&self, foot: Foot, portion: FootPortion) -> FootArrowState {
        self.portions[foot as usize][portion as usize]
    }

    #[inline]
    pub fn foot_portions(&self, foot: Foot) -> [FootArrowState; 2] {
        self.portions[foot as usize]
    }

    pub fn with_foot_portions(&self, foot: Foot, new_portions: [FootArrowState; 2]) -> Self {
        let mut portions = self.portions;
        portions[foot as usize] = new_portions;
        Self::new(portions, self.orientation)
    }

    pub fn with_orientation(&self, orientation: BodyOrientation) -> Self {
        Self::new(self.portions, orientation)
    }

    /// True if any portion of `foot` is Held.
    pub fn foot_is_holding(&self, foot: Foot) -> bool {
        self.foot_portions(foot).iter().any(|p| p.is_held())
    }

    /// True if `arrow` is Resting (not held) under `foot`.
    pub fn foot_rests_on(&self, foot: Foot, arrow: usize) -> bool {
        self.foot_portions(foot)
            .iter()
            .any(|p| p.arrow == Some(arrow) && !p.is_held())
    }

    /// True if `arrow` is occupied (resting or held) by `foot`.
    pub fn foot_occupies(&self, foot: Foot, arrow: usize) -> bool {
        self.foot_portions(foot).iter().any(|p| p.arrow == Some(arrow))
    }

    /// True if `arrow` is occupied by either foot.
    pub fn arrow_occupied(&self, arrow: usize) -> bool {
        ALL_FEET.iter().any(|&f| self.foot_occupies(f, arrow))
    }

    pub fn other_foot(foot: Foot) -> Foot {
        match foot {
            Foot::Left => Foot::Right,
            Foot::Right => Foot::Left,
        }
    }
}

/// One (StepType, FootAction) slot in a [`GraphLink`], with the arrow it
/// acts on recorded directly rather than re-derived from portion storage
/// order (which is canonicalised by arrow index and so doesn't line up
/// with "heel slot" / "toe slot" in general).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkSlot {
    pub step_type: StepType,
    pub action: FootAction,
    pub arrow: usize,
}

/// A `(Foot, FootPortion) -> optional (StepType, FootAction)` table
/// describing one transition out of a [`GraphNode`]. `None` in a slot
/// means that portion plays no part in this link; validity is simply
/// slot-presence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GraphLink {
    slots: [[Option<LinkSlot>; 2]; 2],
}

impl GraphLink {
    pub fn single(foot: Foot, portion: FootPortion, slot: LinkSlot) -> Self {
        let mut link = Self::default();
        link.slots[foot as usize][portion as usize] = Some(slot);
        link
    }

    pub fn bracket(foot: Foot, heel_slot: LinkSlot, toe_slot: LinkSlot) -> Self {
        let mut link = Self::default();
        link.slots[foot as usize][0] = Some(heel_slot);
        link.slots[foot as usize][1] = Some(toe_slot);
        link
    }

    pub fn merge(a: Self, b: Self) -> Self {
        let mut out = Self::default();
        for foot in ALL_FEET {
            for portion in ALL_PORTIONS {
                let fi = foot as usize;
                let pi = portion as usize;
                out.slots[fi][pi] = a.slots[fi][pi].or(b.slots[fi][pi]);
            }
        }
        out
    }

    #[inline]
    pub fn slot(&self, foot: Foot, portion: FootPortion) -> Option<LinkSlot> {
        self.slots[foot as usize][portion as usize]
    }

    pub fn foot_acts(&self, foot: Foot) -> bool {
        self.slot(foot, FootPortion::Heel).is_some() || self.slot(foot, FootPortion::Toe).is_some()
    }

    pub fn is_jump(&self) -> bool {
        self.foot_acts(Foot::Left) && self.foot_acts(Foot::Right)
    }

    pub fn is_release(&self) -> bool {
        ALL_FEET.iter().any(|&f| {
            ALL_PORTIONS
                .iter()
                .any(|&p| matches!(self.slot(f, p), Some(s) if s.action == FootAction::Release))
        })
    }

    /// Arrows acted on by `foot` in this link, in portion order.
    pub fn arrows_for(&self, foot: Foot) -> Vec<usize> {
        let mut out = Vec::with_capacity(2);
        for portion in ALL_PORTIONS {
            if let Some(slot) = self.slot(foot, portion) {
                if !out.contains(&slot.arrow) {
                    out.push(slot.arrow);
                }
            }
        }
        out
    }
}

/// A per-slot instance annotation that re-colours emitted output without
/// affecting graph structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum InstanceAnnotation {
    #[default]
    Normal,
    Roll,
    Fake,
    Lift,
}

/// A [`GraphLink`] plus per-slot instance annotations. Composition, not
/// inheritance, per the design note on `GraphLinkInstance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphLinkInstance {
    pub link: GraphLink,
    annotations: [[InstanceAnnotation; 2]; 2],
}

impl GraphLinkInstance {
    pub fn plain(link: GraphLink) -> Self {
        Self { link, annotations: Default::default() }
    }

    pub fn annotation(&self, foot: Foot, portion: FootPortion) -> InstanceAnnotation {
        self.annotations[foot as usize][portion as usize]
    }

    pub fn set_annotation(&mut self, foot: Foot, portion: FootPortion, ann: InstanceAnnotation) {
        self.annotations[foot as usize][portion as usize] = ann;
    }
}

/// Stable arena handle for a [`GraphNode`] within a built [`StepGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// The full state-transition graph for one pad: every reachable body state
/// and every legal [`GraphLink`] between states.
///
/// Node storage is an arena with stable integer handles; edges never hold
/// owning references to nodes, which is what lets the graph contain cycles
/// (every state can re-tap SameArrow back to itself) without lifetime or
/// reference-counting gymnastics.
pub struct StepGraph {
    pub root: NodeId,
    nodes: Vec<GraphNode>,
    index: HashMap<GraphNode, NodeId>,
    edges: Vec<Vec<(GraphLink, NodeId)>>,
}

impl StepGraph {
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn links_from(&self, id: NodeId) -> &[(GraphLink, NodeId)] {
        &self.edges[id.0 as usize]
    }

    pub fn find_node(&self, node: &GraphNode) -> Option<NodeId> {
        self.index.get(node).copied()
    }

    /// Every distinct [`GraphLink`] present as an outgoing edge anywhere in
    /// the graph.
    pub fn all_links(&self) -> impl Iterator<Item = GraphLink> + '_ {
        let mut seen = std::collections::HashSet::new();
        self.edges
            .iter()
            .flatten()
            .filter_map(move |&(link, _)| seen.insert(link).then_some(link))
    }

    fn intern(&mut self, node: GraphNode) -> (NodeId, bool) {
        if let Some(&id) = self.index.get(&node) {
            return (id, false);
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.edges.push(Vec::new());
        self.index.insert(node, id);
        (id, true)
    }

    /// Pure function of its inputs: BFS from the root over every single-foot
    /// step and two-foot jump the step catalogue admits, deduping nodes by
    /// canonical `GraphNode` equality.
    pub fn build(pad: &PadDescriptor, max_bracket_separation: usize) -> Self {
        let mut graph = Self {
            root: NodeId(0),
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        };

        let root_node = GraphNode::root(pad);
        let (root_id, _) = graph.intern(root_node);
        graph.root = root_id;

        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(root_id);
        let mut complete = vec![false; 1];
        complete[root_id.0 as usize] = true;

        while let Some(current_id) = queue.pop_front() {
            let current = *graph.node(current_id);
            let transitions = step_types::enumerate_transitions(pad, &current, max_bracket_separation);

            let mut seen_links_here = std::collections::HashSet::new();
            for (link, dest) in transitions {
                let (dest_id, is_new) = graph.intern(dest);
                if is_new {
                    if complete.len() <= dest_id.0 as usize {
                        complete.resize(dest_id.0 as usize + 1, false);
                    }
                }
                if seen_links_here.insert((link, dest_id)) {
                    graph.edges[current_id.0 as usize].push((link, dest_id));
                }
                if !complete[dest_id.0 as usize] {
                    complete[dest_id.0 as usize] = true;
                    queue.push_back(dest_id);
                }
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::PadDescriptor;

    #[test]
    fn graph_node_canonicalises_portion_order() {
        let portions = [
            [FootArrowState::resting(3), FootArrowState::resting(0)],
            [FootArrowState::INVALID; 2],
        ];
        let node = GraphNode::new(portions, BodyOrientation::Normal);
        assert_eq!(node.portion(Foot::Left, FootPortion::Heel).arrow, Some(0));
        assert_eq!(node.portion(Foot::Left, FootPortion::Toe).arrow, Some(3));
    }

    #[test]
    fn build_is_reachable_from_root() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        assert!(graph.len() > 1);

        // BFS construction guarantees reachability by built order; verify it
        // directly via a reachability walk from root.
        let mut visited = vec![false; graph.len()];
        let mut stack = vec![graph.root];
        visited[graph.root.0 as usize] = true;
        while let Some(id) = stack.pop() {
            for &(_, dest) in graph.links_from(id) {
                if !visited[dest.0 as usize] {
                    visited[dest.0 as usize] = true;
                    stack.push(dest);
                }
            }
        }
        assert!(visited.iter().all(|&v| v), "every node must be reachable from root");
    }

    #[test]
    fn root_node_rests_on_start_arrows() {
        let pad = PadDescriptor::dance_single();
        let graph = StepGraph::build(&pad, 1);
        let root = graph.node(graph.root);
        assert_eq!(root.portion(Foot::Left, FootPortion::Heel).arrow, Some(pad.left_start_arrow));
        assert_eq!(root.portion(Foot::Right, FootPortion::Heel).arrow, Some(pad.right_start_arrow));
        assert_eq!(root.orientation, BodyOrientation::Normal);
    }
}
