/*!
This module handles the boolean pattern masks ([`Shape`]s) used to detect
matching arrangements of same-kinded tokens, at any of 4 rotations.
*/

use crate::{grid::Grid, GridPos, Mask, MatchResult, Variant};

/// An immutable boolean pattern mask with match metadata.
///
/// The mask is normalized on construction: every row is right-padded with
/// `false` up to the widest row, so the mask is always rectangular. A mask
/// consisting of a single all-`true` row or column is *linear*.
///
/// Shapes are ranked; larger/rarer patterns carry a higher rank, which
/// decides both match priority and which special [`Variant`] a match awards.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    mask: Mask,
    rank: u32,
    linear: bool,
    extend: bool,
    center: GridPos,
}

impl Shape {
    /// Creates a shape from a (possibly ragged) boolean mask and a rank.
    ///
    /// Ragged rows are padded rather than rejected; an all-`false` mask is
    /// valid but never matches anything.
    pub fn new(mask: Mask, rank: u32) -> Self {
        let width = mask.iter().map(Vec::len).max().unwrap_or(0);
        let mask: Mask = mask
            .into_iter()
            .map(|mut row| {
                row.resize(width, false);
                row
            })
            .collect();

        let linear = (mask.len() == 1 && mask[0].iter().all(|&cell| cell))
            || (width == 1 && !mask.is_empty() && mask.iter().all(|row| row[0]));

        // The center cell is the ⌊n/2⌋-th `true` cell in row-major order.
        let true_cells = || {
            mask.iter().enumerate().flat_map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .filter_map(move |(c, &cell)| cell.then_some(GridPos::new(r, c)))
            })
        };
        let count = true_cells().count();
        let center = true_cells().nth(count / 2).unwrap_or(GridPos::new(0, 0));

        Self {
            mask,
            rank,
            linear,
            extend: false,
            center,
        }
    }

    /// Creates a single-row shape of the given length.
    pub fn from_length(length: usize, rank: u32) -> Self {
        Self::new(vec![vec![true; length]], rank)
    }

    /// Sets the "or more" flag declared on extendable linear shapes.
    ///
    /// The flag is stored and surfaced but not consulted by the matching
    /// algorithm, which only ever tests the fixed mask.
    pub fn with_extend(mut self, extend: bool) -> Self {
        self.extend = extend;
        self
    }

    /// The normalized, rectangular boolean mask.
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Ordering value used for match priority and variant selection.
    pub const fn rank(&self) -> u32 {
        self.rank
    }

    /// Whether the mask is a single all-`true` row or column.
    pub const fn linear(&self) -> bool {
        self.linear
    }

    /// The declared "or more" flag; only linear shapes can carry it.
    pub const fn extend(&self) -> bool {
        self.extend && self.linear
    }

    /// The mask's center cell in unrotated mask coordinates.
    pub const fn center_cell(&self) -> GridPos {
        self.center
    }

    /// Overlays the mask at `origin` and tests all 4 rotations in order,
    /// returning the first that fully matches.
    ///
    /// Every `true` cell of the rotated mask must land on an in-bounds,
    /// in-play token whose kind equals the kind established by the first
    /// `true` cell in row-major order; any mismatch or out-of-bounds cell
    /// fails that rotation. Blank or already-matched tokens never satisfy a
    /// mask cell. A window that matches no rotation yields `None`, never an
    /// error.
    pub fn matches(&self, grid: &Grid, origin: GridPos, shape_index: usize) -> Option<MatchResult> {
        let rows = self.mask.len();
        let cols = self.mask.first().map_or(0, Vec::len);

        'rotation: for turns in 0..4 {
            let mask = rotate_mask(&self.mask, turns);
            let mut anchor_kind: Option<&str> = None;
            let mut positions = Vec::new();

            for (r, mask_row) in mask.iter().enumerate() {
                for (c, &must_match) in mask_row.iter().enumerate() {
                    if !must_match {
                        continue;
                    }
                    let pos = GridPos::new(origin.row + r, origin.col + c);
                    let Some(token) = grid.get(pos) else {
                        continue 'rotation;
                    };
                    if token.is_blank() || token.is_matched() {
                        continue 'rotation;
                    }
                    if *anchor_kind.get_or_insert(token.kind()) != token.kind() {
                        continue 'rotation;
                    }
                    positions.push(pos);
                }
            }

            // An all-`false` mask would vacuously match everywhere.
            if positions.is_empty() {
                return None;
            }

            let center = rotate_pos(self.center, rows, cols, turns);
            return Some(MatchResult {
                shape_index,
                rank: self.rank,
                rotation: turns,
                positions,
                center: GridPos::new(origin.row + center.row, origin.col + center.col),
            });
        }
        None
    }

    /// Overlays the unrotated mask at a signed `(row, col)` offset and
    /// returns every in-bounds grid position under a `true` mask cell.
    ///
    /// Unlike [`Shape::matches`] this is a pure geometric selector: token
    /// kinds are not compared, and cells outside the grid are silently
    /// skipped (the mask is clipped, not the grid).
    pub fn screen(&self, grid: &Grid, (row_offset, col_offset): (isize, isize)) -> Vec<GridPos> {
        let mut positions = Vec::new();
        for (r, mask_row) in self.mask.iter().enumerate() {
            for (c, &selected) in mask_row.iter().enumerate() {
                if !selected {
                    continue;
                }
                let (Some(row), Some(col)) = (
                    usize::try_from(row_offset + r as isize).ok(),
                    usize::try_from(col_offset + c as isize).ok(),
                ) else {
                    continue;
                };
                let pos = GridPos::new(row, col);
                if grid.contains(pos) {
                    positions.push(pos);
                }
            }
        }
        positions
    }

    /// The special variant a match of this shape awards, if any.
    ///
    /// Rank 1 shapes award nothing. Linear rank 2 shapes award a row or
    /// column clear matching their orientation on the grid; longer linear
    /// shapes award a kind-wide clear. The full-rectangle rank 7 shape
    /// awards a cross clear; other compact shapes award a bomb.
    pub const fn promotion(&self, rotation: u8) -> Option<Variant> {
        match (self.linear, self.rank) {
            (_, 0 | 1) => None,
            (true, 2) => Some(if rotation % 2 == 0 {
                Variant::HorizontalClear
            } else {
                Variant::VerticalClear
            }),
            (true, _) => Some(Variant::TypeClear),
            (false, 7..) => Some(Variant::CrossClear),
            (false, _) => Some(Variant::BombClear),
        }
    }
}

/// Rotates a boolean mask clockwise by `turns` quarter-turns.
///
/// Rotating any mask 4 times returns the original mask.
pub fn rotate_mask(mask: &Mask, turns: u8) -> Mask {
    let rows = mask.len();
    let cols = mask.first().map_or(0, Vec::len);
    match turns % 4 {
        1 => {
            let mut rotated = vec![vec![false; rows]; cols];
            for (r, row) in mask.iter().enumerate() {
                for (c, &cell) in row.iter().enumerate() {
                    rotated[c][rows - r - 1] = cell;
                }
            }
            rotated
        }
        2 => mask
            .iter()
            .rev()
            .map(|row| row.iter().rev().copied().collect())
            .collect(),
        3 => {
            let mut rotated = vec![vec![false; rows]; cols];
            for (r, row) in mask.iter().enumerate() {
                for (c, &cell) in row.iter().enumerate() {
                    rotated[cols - c - 1][r] = cell;
                }
            }
            rotated
        }
        _ => mask.clone(),
    }
}

/// Maps a cell position of an `rows × cols` grid to its position after the
/// grid is rotated clockwise by `turns` quarter-turns.
pub(crate) const fn rotate_pos(pos: GridPos, rows: usize, cols: usize, turns: u8) -> GridPos {
    match turns % 4 {
        1 => GridPos::new(pos.col, rows - pos.row - 1),
        2 => GridPos::new(rows - pos.row - 1, cols - pos.col - 1),
        3 => GridPos::new(cols - pos.col - 1, pos.row),
        _ => pos,
    }
}

/// The standard shape registry, in ascending rank order.
///
/// Linear runs of 3 through 6 (the 6-run declared extendable), an L corner,
/// a T junction, and a 2×2 square.
pub fn default_shapes() -> Vec<Shape> {
    const T: bool = true;
    const F: bool = false;
    vec![
        Shape::from_length(3, 1),
        Shape::from_length(4, 2),
        Shape::from_length(5, 3),
        Shape::from_length(6, 4).with_extend(true),
        Shape::new(vec![vec![T, T, T], vec![T], vec![T]], 5),
        Shape::new(vec![vec![T, T, T], vec![F, T], vec![F, T]], 6),
        Shape::new(vec![vec![T, T], vec![T, T]], 7),
    ]
}

/// The fixed diamond mask detonated by [`Variant::BombClear`] tokens,
/// centered on the exploding token.
pub(crate) fn bomb_shape() -> Shape {
    const T: bool = true;
    const F: bool = false;
    Shape::new(
        vec![
            vec![F, F, T, F, F],
            vec![F, T, T, T, F],
            vec![T, T, T, T, T],
            vec![F, T, T, T, F],
            vec![F, F, T, F, F],
        ],
        0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Token;

    fn grid_of(kinds: &[&[&str]]) -> Grid {
        let rows = kinds
            .iter()
            .map(|row| row.iter().map(|kind| Token::new(*kind).unwrap()).collect())
            .collect();
        Grid::new(rows).unwrap()
    }

    #[test]
    fn rotating_four_times_is_identity() {
        let masks: [Mask; 3] = [
            vec![vec![true, true, true]],
            vec![vec![true, true, true], vec![true, false, false], vec![true, false, false]],
            vec![vec![true, true], vec![true, true]],
        ];
        for mask in masks {
            let mut rotated = mask.clone();
            for _ in 0..4 {
                rotated = rotate_mask(&rotated, 1);
            }
            assert_eq!(rotated, mask);
            assert_eq!(rotate_mask(&mask, 4), mask);
        }
    }

    #[test]
    fn rotating_once_turns_rows_into_columns() {
        let mask = vec![vec![true, true, true]];
        assert_eq!(
            rotate_mask(&mask, 1),
            vec![vec![true], vec![true], vec![true]]
        );
    }

    #[test]
    fn rotated_positions_follow_the_mask() {
        let mask = vec![vec![true, false], vec![false, false], vec![false, false]];
        for turns in 0..4 {
            let rotated = rotate_mask(&mask, turns);
            let pos = rotate_pos(GridPos::new(0, 0), 3, 2, turns);
            assert!(rotated[pos.row][pos.col], "turns = {turns}");
        }
    }

    #[test]
    fn ragged_masks_are_padded() {
        let shape = Shape::new(vec![vec![true, true, true], vec![false, true]], 6);
        assert_eq!(shape.mask()[1], vec![false, true, false]);
    }

    #[test]
    fn linearity_is_derived_from_the_mask() {
        assert!(Shape::from_length(3, 1).linear());
        assert!(Shape::new(vec![vec![true], vec![true]], 1).linear());
        assert!(!Shape::new(vec![vec![true, true], vec![true, true]], 7).linear());
        assert!(!Shape::new(vec![vec![true, false, true]], 1).linear());
    }

    #[test]
    fn only_linear_shapes_extend() {
        assert!(Shape::from_length(6, 4).with_extend(true).extend());
        let square = Shape::new(vec![vec![true, true], vec![true, true]], 7);
        assert!(!square.with_extend(true).extend());
    }

    #[test]
    fn center_cell_is_middle_true_cell() {
        assert_eq!(Shape::from_length(3, 1).center_cell(), GridPos::new(0, 1));
        assert_eq!(Shape::from_length(4, 2).center_cell(), GridPos::new(0, 2));
        let corner = Shape::new(vec![vec![true, true, true], vec![true], vec![true]], 5);
        assert_eq!(corner.center_cell(), GridPos::new(0, 2));
    }

    #[test]
    fn three_in_a_row_matches_at_rotation_zero() {
        let grid = grid_of(&[&["red", "red", "red"]]);
        let result = Shape::from_length(3, 1)
            .matches(&grid, GridPos::new(0, 0), 0)
            .unwrap();
        assert_eq!(result.rotation, 0);
        assert_eq!(
            result.positions,
            vec![GridPos::new(0, 0), GridPos::new(0, 1), GridPos::new(0, 2)]
        );
        assert_eq!(result.center, GridPos::new(0, 1));
        assert_eq!(result.rank, 1);
    }

    #[test]
    fn three_in_a_column_matches_at_rotation_one() {
        let grid = grid_of(&[&["a", "b"], &["a", "c"], &["a", "b"]]);
        let result = Shape::from_length(3, 1)
            .matches(&grid, GridPos::new(0, 0), 0)
            .unwrap();
        assert_eq!(result.rotation, 1);
        assert_eq!(
            result.positions,
            vec![GridPos::new(0, 0), GridPos::new(1, 0), GridPos::new(2, 0)]
        );
        assert_eq!(result.center, GridPos::new(1, 0));
    }

    #[test]
    fn mismatched_or_out_of_bounds_windows_do_not_match() {
        let shape = Shape::from_length(3, 1);
        let grid = grid_of(&[&["a", "a", "b"], &["a", "a", "a"]]);
        assert!(shape.matches(&grid, GridPos::new(0, 0), 0).is_none());
        assert!(shape.matches(&grid, GridPos::new(1, 1), 0).is_none());
        assert!(shape.matches(&grid, GridPos::new(5, 5), 0).is_none());
    }

    #[test]
    fn matched_and_blank_tokens_never_satisfy_a_mask_cell() {
        let mut grid = grid_of(&[&["a", "a", "a"]]);
        grid.get_mut(GridPos::new(0, 1)).unwrap().matched_at =
            Some(std::time::Duration::from_millis(1));
        assert!(Shape::from_length(3, 1)
            .matches(&grid, GridPos::new(0, 0), 0)
            .is_none());
    }

    #[test]
    fn screening_clips_the_mask_not_the_grid() {
        let grid = grid_of(&[&["a", "a", "a"], &["a", "a", "a"], &["a", "a", "a"]]);
        // Bomb centered on the top-left corner: most of the diamond hangs
        // off the board.
        let positions = bomb_shape().screen(&grid, (-2, -2));
        assert_eq!(
            positions,
            vec![
                GridPos::new(0, 0),
                GridPos::new(0, 1),
                GridPos::new(0, 2),
                GridPos::new(1, 0),
                GridPos::new(1, 1),
                GridPos::new(2, 0),
            ]
        );
    }

    #[test]
    fn screening_ignores_token_kinds() {
        let grid = grid_of(&[&["a", "b"], &["c", "d"]]);
        let square = Shape::new(vec![vec![true, true], vec![true, true]], 7);
        assert_eq!(square.screen(&grid, (0, 0)).len(), 4);
    }

    #[test]
    fn promotions_follow_rank_and_orientation() {
        let shapes = default_shapes();
        assert_eq!(shapes[0].promotion(0), None);
        assert_eq!(shapes[1].promotion(0), Some(Variant::HorizontalClear));
        assert_eq!(shapes[1].promotion(1), Some(Variant::VerticalClear));
        assert_eq!(shapes[2].promotion(0), Some(Variant::TypeClear));
        assert_eq!(shapes[3].promotion(2), Some(Variant::TypeClear));
        assert_eq!(shapes[4].promotion(0), Some(Variant::BombClear));
        assert_eq!(shapes[5].promotion(3), Some(Variant::BombClear));
        assert_eq!(shapes[6].promotion(0), Some(Variant::CrossClear));
    }
}
