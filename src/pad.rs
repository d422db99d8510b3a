//! Pad geometry: arrow counts, start positions, and the per-arrow adjacency
//! relations ([`ArrowData`]) the rest of the core reasons about.
//!
//! Generalises `step_parity::StageLayout`, which hard-coded a single
//! 4-panel layout with inline distance math, into literal relation tables
//! plus a doubles layout, per the arrow-data bitmap model.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::step_types::Foot;

/// Bitmask over arrow indices. Doubles (8 arrows) comfortably fits a `u16`.
pub type ArrowMask = u16;

#[inline]
pub fn mask_of(arrows: &[usize]) -> ArrowMask {
    arrows.iter().fold(0, |m, &a| m | (1 << a))
}

#[inline]
pub fn mask_contains(mask: ArrowMask, arrow: usize) -> bool {
    mask & (1 << arrow) != 0
}

#[inline]
pub fn mask_iter(mask: ArrowMask, num_arrows: usize) -> impl Iterator<Item = usize> {
    (0..num_arrows).filter(move |&a| mask_contains(mask, a))
}

/// The eight per-arrow relation tables described by the pad's adjacency
/// model. Every field is a bitmap over arrow indices and is interpreted
/// relative to the foot standing on this arrow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArrowData {
    /// Arrows this foot may step to next (NewArrow/SameArrow reachability).
    pub valid_next: ArrowMask,
    /// Arrows the *other* portion of this same foot may bracket onto when
    /// this arrow is held by the heel.
    pub bracketable_with_other_heel: ArrowMask,
    /// As above, when this arrow is held by the toe.
    pub bracketable_with_other_toe: ArrowMask,
    /// Arrows the other foot may occupy simultaneously without crossing.
    pub other_foot_pairing: ArrowMask,
    /// Arrows that, if taken by the other foot, constitute a crossover with
    /// that foot stepping in front.
    pub crossover_front: ArrowMask,
    /// As above, other foot stepping behind.
    pub crossover_behind: ArrowMask,
    /// Arrows that, if taken by the other foot, constitute an inversion with
    /// this foot stepping in front.
    pub invert_front: ArrowMask,
    /// As above, this foot stepping behind.
    pub invert_behind: ArrowMask,
}

/// A pad layout: arrow count, start arrows, and per-arrow relation tables.
#[derive(Clone, Debug)]
pub struct PadDescriptor {
    pub name: &'static str,
    pub num_arrows: usize,
    pub left_start_arrow: usize,
    pub right_start_arrow: usize,
    /// Indexed by arrow.
    pub arrow_data: Vec<ArrowData>,
}

impl PadDescriptor {
    /// 4-panel "singles" layout: Left, Down, Up, Right.
    pub fn dance_single() -> Self {
        const LEFT: usize = 0;
        const DOWN: usize = 1;
        const UP: usize = 2;
        const RIGHT: usize = 3;

        let mut arrow_data = vec![ArrowData::default(); 4];

        // Valid-next: every arrow can reach every other arrow (no pad gaps
        // on singles) plus itself for SameArrow re-taps.
        for a in 0..4 {
            arrow_data[a].valid_next = mask_of(&[0, 1, 2, 3]);
        }

        // Adjacent arrows are bracketable by a single foot; the up/down and
        // left/right diagonals are not (too far apart physically).
        arrow_data[LEFT].bracketable_with_other_heel = mask_of(&[DOWN]);
        arrow_data[LEFT].bracketable_with_other_toe = mask_of(&[UP]);
        arrow_data[DOWN].bracketable_with_other_heel = mask_of(&[LEFT]);
        arrow_data[DOWN].bracketable_with_other_toe = mask_of(&[RIGHT]);
        arrow_data[UP].bracketable_with_other_heel = mask_of(&[LEFT]);
        arrow_data[UP].bracketable_with_other_toe = mask_of(&[RIGHT]);
        arrow_data[RIGHT].bracketable_with_other_heel = mask_of(&[DOWN]);
        arrow_data[RIGHT].bracketable_with_other_toe = mask_of(&[UP]);

        // Non-crossover pairing: the other foot may stand anywhere except
        // the arrow this foot already occupies.
        for a in 0..4 {
            let others: Vec<usize> = (0..4).filter(|&b| b != a).collect();
            arrow_data[a].other_foot_pairing = mask_of(&others);
        }

        // Crossovers: Left foot in front of Right on the right-hand arrow
        // (and vice versa) are the only crossover pairings on a 4-panel pad.
        arrow_data[LEFT].crossover_behind = mask_of(&[RIGHT]);
        arrow_data[RIGHT].crossover_front = mask_of(&[LEFT]);

        // Inversions mirror crossovers on singles (rotated-torso variant of
        // the same opposite-side placement).
        arrow_data[LEFT].invert_behind = mask_of(&[RIGHT]);
        arrow_data[RIGHT].invert_front = mask_of(&[LEFT]);

        Self {
            name: "dance-single",
            num_arrows: 4,
            left_start_arrow: LEFT,
            right_start_arrow: RIGHT,
            arrow_data,
        }
    }

    /// 8-panel "doubles" layout: two singles pads placed side by side,
    /// arrows 0..4 on the left pad and 4..8 on the right pad.
    pub fn dance_double() -> Self {
        const NUM: usize = 8;
        let single = Self::dance_single();
        let mut arrow_data = vec![ArrowData::default(); NUM];

        for half in 0..2 {
            let base = half * 4;
            for a in 0..4 {
                let src = &single.arrow_data[a];
                let shift = |mask: ArrowMask| -> ArrowMask {
                    mask_iter(mask, 4).map(|b| b + base).fold(0, |m, b| m | (1 << b))
                };
                let dst = &mut arrow_data[base + a];
                dst.valid_next = shift(src.valid_next);
                dst.bracketable_with_other_heel = shift(src.bracketable_with_other_heel);
                dst.bracketable_with_other_toe = shift(src.bracketable_with_other_toe);
                dst.crossover_front = shift(src.crossover_front);
                dst.crossover_behind = shift(src.crossover_behind);
                dst.invert_front = shift(src.invert_front);
                dst.invert_behind = shift(src.invert_behind);
            }
        }

        // The other foot may stand anywhere on the pad except this arrow,
        // including across the halves (centre-centre jumps and beyond).
        for a in 0..NUM {
            let others: Vec<usize> = (0..NUM).filter(|&b| b != a).collect();
            arrow_data[a].other_foot_pairing = mask_of(&others);
        }

        Self {
            name: "dance-double",
            num_arrows: NUM,
            left_start_arrow: 1, // left pad's Down
            right_start_arrow: 6, // right pad's Up
            arrow_data,
        }
    }

    /// Reflects an arrow index across the centre of the pad (`i` <->
    /// `num_arrows - 1 - i`), used by the mirror-symmetry self-check.
    #[inline]
    pub fn mirror_arrow(&self, arrow: usize) -> usize {
        self.num_arrows - 1 - arrow
    }

    fn mirror_mask(&self, mask: ArrowMask) -> ArrowMask {
        mask_iter(mask, self.num_arrows)
            .map(|a| self.mirror_arrow(a))
            .fold(0, |m, a| m | (1 << a))
    }

    /// Checks that reflecting the pad left-right and swapping feet L<->R
    /// preserves every relation, except bracketability, which swaps heel
    /// and toe across the mirror (matching the physical meaning of the
    /// portions). A mismatch here means the pad's own relation tables are
    /// internally inconsistent, which is a programmer error rather than
    /// anything a particular chart could trigger.
    pub fn assert_mirror_symmetric(&self) -> Result<(), CoreError> {
        for a in 0..self.num_arrows {
            let mirrored = self.mirror_arrow(a);
            let data = &self.arrow_data[a];
            let mirror_data = &self.arrow_data[mirrored];

            if self.mirror_mask(data.valid_next) != mirror_data.valid_next {
                return Err(CoreError::Programmer(format!(
                    "pad {:?}: valid_next asymmetric at arrow {a}",
                    self.name
                )));
            }
            if self.mirror_mask(data.other_foot_pairing) != mirror_data.other_foot_pairing {
                return Err(CoreError::Programmer(format!(
                    "pad {:?}: other_foot_pairing asymmetric at arrow {a}",
                    self.name
                )));
            }
            // Crossover front/behind swap roles under mirroring: what was a
            // front crossover from this side becomes a behind crossover
            // from the mirrored side.
            if self.mirror_mask(data.crossover_front) != mirror_data.crossover_behind {
                return Err(CoreError::Programmer(format!(
                    "pad {:?}: crossover front/behind asymmetric at arrow {a}",
                    self.name
                )));
            }
            if self.mirror_mask(data.invert_front) != mirror_data.invert_behind {
                return Err(CoreError::Programmer(format!(
                    "pad {:?}: invert front/behind asymmetric at arrow {a}",
                    self.name
                )));
            }
            // Bracketability inverts heel/toe across the mirror.
            if self.mirror_mask(data.bracketable_with_other_heel) != mirror_data.bracketable_with_other_toe {
                return Err(CoreError::Programmer(format!(
                    "pad {:?}: bracket heel/toe asymmetric at arrow {a}",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// All arrows reachable from `arrow` via `valid_next`, as a `HashSet`
    /// convenience for callers that want set operations.
    pub fn valid_next_set(&self, arrow: usize) -> HashSet<usize> {
        mask_iter(self.arrow_data[arrow].valid_next, self.num_arrows).collect()
    }

    pub fn start_arrow(&self, foot: Foot) -> usize {
        match foot {
            Foot::Left => self.left_start_arrow,
            Foot::Right => self.right_start_arrow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dance_single_is_mirror_symmetric() {
        PadDescriptor::dance_single().assert_mirror_symmetric().unwrap();
    }

    #[test]
    fn dance_double_is_mirror_symmetric() {
        PadDescriptor::dance_double().assert_mirror_symmetric().unwrap();
    }

    #[test]
    fn dance_single_valid_next_includes_self_retap() {
        let pad = PadDescriptor::dance_single();
        assert!(mask_contains(pad.arrow_data[0].valid_next, 0));
    }
}
