/*!
This module handles rectangular storage of [`Token`]s: bounds-checked
queries, adjacency, and reference-preserving swaps.
*/

use crate::{Direction, GridPos, NewGridError, Token, TokenId};

/// Rectangular, row-major storage of [`Token`]s.
///
/// Every row has identical length at all times; this is enforced on
/// construction and no operation resizes the grid afterwards. Cells are
/// overwritten in place for the life of the board. Token identities
/// ([`TokenId`]) are issued by the grid, so tokens keep their identity as
/// swaps and gravity move them between cells.
#[derive(Eq, PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Grid {
    rows: Vec<Vec<Token>>,
    next_token_id: TokenId,
}

impl Grid {
    /// Creates a grid from rows of tokens, issuing each token a fresh
    /// identity.
    ///
    /// # Errors
    ///
    /// Fails with [`NewGridError`] if `rows` is empty, contains an empty
    /// row, or is not rectangular.
    pub fn new(rows: Vec<Vec<Token>>) -> Result<Self, NewGridError> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(NewGridError::Empty);
        }
        if !rows.iter().all(|row| row.len() == rows[0].len()) {
            return Err(NewGridError::RaggedRows);
        }
        let mut grid = Self {
            rows,
            next_token_id: 0,
        };
        for row in &mut grid.rows {
            for token in row {
                token.id = grid.next_token_id;
                grid.next_token_id += 1;
            }
        }
        Ok(grid)
    }

    /// Creates a `row_count × col_count` grid by invoking a token source
    /// per cell in row-major order.
    pub(crate) fn generate(
        row_count: usize,
        col_count: usize,
        mut source: impl FnMut() -> Token,
    ) -> Self {
        let rows = (0..row_count)
            .map(|_| (0..col_count).map(|_| source()).collect())
            .collect();
        // Dimensions are validated by the board builder before this runs.
        Self::new(rows).expect("generated rows are rectangular and non-empty")
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn col_count(&self) -> usize {
        self.rows[0].len()
    }

    /// The grid's rows, topmost first; the primary storage.
    pub fn rows(&self) -> &[Vec<Token>] {
        &self.rows
    }

    /// The grid's columns, leftmost first; a view derived from the rows.
    pub fn columns(&self) -> Vec<Vec<&Token>> {
        (0..self.col_count())
            .map(|col| self.rows.iter().map(|row| &row[col]).collect())
            .collect()
    }

    /// Iterator over all tokens in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Token> {
        self.rows.iter().flatten()
    }

    /// Iterator over all cell positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = GridPos> {
        let cols = self.col_count();
        (0..self.row_count()).flat_map(move |row| (0..cols).map(move |col| GridPos::new(row, col)))
    }

    /// Whether the given position lies on the grid.
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.row < self.row_count() && pos.col < self.col_count()
    }

    /// The token at the given position, or `None` if out of bounds.
    ///
    /// Out-of-range queries arise routinely from boundary input and are
    /// never an error.
    pub fn get(&self, pos: GridPos) -> Option<&Token> {
        self.rows.get(pos.row)?.get(pos.col)
    }

    pub(crate) fn get_mut(&mut self, pos: GridPos) -> Option<&mut Token> {
        self.rows.get_mut(pos.row)?.get_mut(pos.col)
    }

    /// Resolves the cell one step from `origin` in the given direction.
    ///
    /// [`Direction::None`] resolves to the origin itself. Returns `None`
    /// if the resolved cell (or the origin) lies off the grid.
    pub fn adjacent(&self, origin: GridPos, direction: Direction) -> Option<GridPos> {
        if !self.contains(origin) {
            return None;
        }
        let (dr, dc) = direction.offset();
        let pos = GridPos::new(
            origin.row.checked_add_signed(dr)?,
            origin.col.checked_add_signed(dc)?,
        );
        self.contains(pos).then_some(pos)
    }

    /// Exchanges the tokens at two positions, moving them without copying.
    ///
    /// A no-op returning `false` if either position is out of bounds.
    /// Swapping the same pair twice restores the original state.
    pub fn swap(&mut self, a: GridPos, b: GridPos) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        if a == b {
            return true;
        }
        if a.row == b.row {
            self.rows[a.row].swap(a.col, b.col);
        } else {
            let (first, second) = self.rows.split_at_mut(a.row.max(b.row));
            let (hi, lo) = (a.row.min(b.row), a.row.max(b.row));
            let (hi_col, lo_col) = if a.row < b.row {
                (a.col, b.col)
            } else {
                (b.col, a.col)
            };
            let first_len = first.len();
            std::mem::swap(&mut first[hi][hi_col], &mut second[lo - first_len][lo_col]);
        }
        true
    }

    /// Replaces the token at `pos` with a new one, issuing it a fresh
    /// identity. The position must be in bounds.
    pub(crate) fn respawn(&mut self, pos: GridPos, mut token: Token) {
        token.id = self.next_token_id;
        self.next_token_id += 1;
        self.rows[pos.row][pos.col] = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_of(kinds: &[&[&str]]) -> Grid {
        let rows = kinds
            .iter()
            .map(|row| row.iter().map(|kind| Token::new(*kind).unwrap()).collect())
            .collect();
        Grid::new(rows).unwrap()
    }

    #[test]
    fn construction_rejects_ragged_or_empty_rows() {
        assert_eq!(Grid::new(vec![]), Err(NewGridError::Empty));
        assert_eq!(Grid::new(vec![vec![]]), Err(NewGridError::Empty));
        let ragged = vec![
            vec![Token::new("a").unwrap(), Token::new("a").unwrap()],
            vec![Token::new("a").unwrap()],
        ];
        assert_eq!(Grid::new(ragged), Err(NewGridError::RaggedRows));
    }

    #[test]
    fn tokens_get_distinct_identities() {
        let grid = grid_of(&[&["a", "b"], &["c", "d"]]);
        let mut ids: Vec<_> = grid.tiles().map(Token::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn columns_are_a_transposed_view_of_rows() {
        let grid = grid_of(&[&["a", "b", "c"], &["d", "e", "f"]]);
        let columns = grid.columns();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1][0].kind(), "b");
        assert_eq!(columns[1][1].kind(), "e");
        // Every row has equal length after construction (invariant).
        assert!(grid.rows().iter().all(|row| row.len() == grid.col_count()));
    }

    #[test]
    fn out_of_bounds_queries_are_absorbed() {
        let grid = grid_of(&[&["a", "b"], &["c", "d"]]);
        assert!(grid.get(GridPos::new(2, 0)).is_none());
        assert!(grid.get(GridPos::new(0, 9)).is_none());
        assert!(grid.adjacent(GridPos::new(0, 0), Direction::Up).is_none());
        assert!(grid.adjacent(GridPos::new(1, 1), Direction::Right).is_none());
    }

    #[test]
    fn adjacency_resolves_compass_directions() {
        let grid = grid_of(&[&["a", "b"], &["c", "d"]]);
        let origin = GridPos::new(0, 0);
        assert_eq!(grid.adjacent(origin, Direction::None), Some(origin));
        assert_eq!(
            grid.adjacent(origin, Direction::Down),
            Some(GridPos::new(1, 0))
        );
        assert_eq!(
            grid.adjacent(origin, Direction::Right),
            Some(GridPos::new(0, 1))
        );
    }

    #[test]
    fn swap_is_self_inverse_and_preserves_identity() {
        let mut grid = grid_of(&[&["a", "b"], &["c", "d"]]);
        let (a, b) = (GridPos::new(0, 0), GridPos::new(1, 1));
        let id_a = grid.get(a).unwrap().id();
        let id_b = grid.get(b).unwrap().id();

        assert!(grid.swap(a, b));
        assert_eq!(grid.get(a).unwrap().id(), id_b);
        assert_eq!(grid.get(b).unwrap().id(), id_a);
        assert_eq!(grid.get(a).unwrap().kind(), "d");

        assert!(grid.swap(a, b));
        assert_eq!(grid.get(a).unwrap().id(), id_a);
        assert_eq!(grid.get(a).unwrap().kind(), "a");
        assert_eq!(grid.get(b).unwrap().kind(), "d");
    }

    #[test]
    fn swapping_out_of_bounds_mutates_nothing() {
        let mut grid = grid_of(&[&["a", "b"]]);
        let before = grid.clone();
        assert!(!grid.swap(GridPos::new(0, 0), GridPos::new(0, 5)));
        assert_eq!(grid, before);
    }

    #[test]
    fn same_row_and_same_cell_swaps() {
        let mut grid = grid_of(&[&["a", "b", "c"]]);
        assert!(grid.swap(GridPos::new(0, 0), GridPos::new(0, 2)));
        assert_eq!(grid.get(GridPos::new(0, 0)).unwrap().kind(), "c");
        assert!(grid.swap(GridPos::new(0, 1), GridPos::new(0, 1)));
        assert_eq!(grid.get(GridPos::new(0, 1)).unwrap().kind(), "b");
    }

    #[test]
    fn respawn_issues_a_fresh_identity() {
        let mut grid = grid_of(&[&["a", "b"]]);
        let pos = GridPos::new(0, 0);
        let old_id = grid.get(pos).unwrap().id();
        grid.respawn(pos, Token::new("z").unwrap());
        let token = grid.get(pos).unwrap();
        assert_eq!(token.kind(), "z");
        assert_ne!(token.id(), old_id);
    }
}
