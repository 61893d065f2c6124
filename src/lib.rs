/*!
# Cascade Engine

`cascade_engine` is an implementation of a match-3 style grid puzzle engine:
a rectangular grid of typed tokens which players mutate by swapping adjacent
cells, triggering shape matches that remove tokens, promote special tokens
with area-effect abilities, and cascade further matches under gravity.

The engine owns no display loop and renders nothing; an embedding application
drives it by calling [`Board::update`] once per tick with the current in-game
time and consumes the returned [`Feedback`] messages for scoring and effects.

# Examples

```
use cascade_engine::*;

// Setting up a board - note that in-game time starts at 0.0s.
let mut board = Board::builder()
    .seed(42)
    /* ...Further optional configuration possible... */
    .build()
    .unwrap();

// A freshly built board is stabilized: it contains no pre-existing matches.
assert!(board.match_shapes().is_empty());

// Queue a player swap; it is applied at the start of the next update.
board.request_swap(GridPos::new(4, 4), SwapTarget::Toward(Direction::Right));

// Advance the simulation; matched and promoted tokens are reported back.
let msgs = board.update(InGameTime::from_millis(16)).unwrap();
for (_time, feedback) in msgs {
    if let Feedback::TokenMatched { kind, .. } = feedback {
        println!("scored a {kind} token");
    }
}
```
*/

#![warn(missing_docs)]

mod board_builder;
mod board_update;
pub mod grid;
pub mod shape;
pub mod token_generator;

use std::{fmt, time::Duration};

pub use board_builder::BoardBuilder;
pub use grid::Grid;
pub use shape::{default_shapes, rotate_mask, Shape};
pub use token_generator::{KindEntry, TokenGenerator};

/// Identifier of a single [`Token`]'s identity over its lifetime on a board.
///
/// Tokens are moved (never copied) by swaps and gravity, so their id follows
/// them around the grid. Embedding applications can key presentation records
/// (sprite, color, animation state) off this id instead of subclassing tokens.
pub type TokenId = u64;
/// A rectangular boolean pattern grid used by [`Shape`]s.
pub type Mask = Vec<Vec<bool>>;
/// The type used to identify points in time in a board's internal timeline.
pub type InGameTime = Duration;
/// The internal RNG used by a board.
pub type BoardRng = rand_chacha::ChaCha12Rng;
/// Convenient type alias to denote a [`Feedback`] associated with some [`InGameTime`].
pub type FeedbackMsg = (InGameTime, Feedback);

/// The special ability carried by a [`Token`].
///
/// All tokens start out [`Variant::Mundane`]; qualifying matches promote one
/// member token to a special variant, which detonates its area effect the
/// next time it is matched.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Variant {
    /// No special ability.
    #[default]
    Mundane = 0,
    /// Clears every token in the holder's row.
    HorizontalClear,
    /// Clears every token in the holder's column.
    VerticalClear,
    /// Clears the union of the holder's row and column.
    CrossClear,
    /// Clears every token on the board sharing the holder's kind.
    TypeClear,
    /// Clears every token under a fixed diamond mask centered on the holder.
    BombClear,
}

impl Variant {
    /// All `Variant` enum variants in order.
    ///
    /// Note that `Variant::VARIANTS[v as usize] == v` always holds.
    pub const VARIANTS: [Self; 6] = {
        use Variant::*;
        [
            Mundane,
            HorizontalClear,
            VerticalClear,
            CrossClear,
            TypeClear,
            BombClear,
        ]
    };
}

/// A single grid cell's content: kind, special variant and lifecycle flags.
///
/// Lifecycle per instance: mundane → matched (pending removal) → blank
/// (awaiting respawn), or mundane → matched → promoted (special, unmatched).
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub(crate) id: TokenId,
    pub(crate) kind: String,
    pub(crate) variant: Variant,
    pub(crate) value: u32,
    pub(crate) matched_at: Option<InGameTime>,
    pub(crate) blank_at: Option<InGameTime>,
    pub(crate) blank: bool,
}

impl Token {
    /// Creates a new mundane token of the given kind with value 1.
    ///
    /// # Errors
    ///
    /// Fails with [`NewTokenError`] if `kind` is empty; there is no valid
    /// token without a kind.
    pub fn new(kind: impl Into<String>) -> Result<Self, NewTokenError> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(NewTokenError);
        }
        Ok(Self {
            id: 0,
            kind,
            variant: Variant::Mundane,
            value: 1,
            matched_at: None,
            blank_at: None,
            blank: false,
        })
    }

    /// The identity of this token, issued by the grid it lives on.
    pub const fn id(&self) -> TokenId {
        self.id
    }

    /// The kind of this token; the match discriminant.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The special ability this token carries.
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// Numeric weight of this token, for use by scoring collaborators.
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Whether this token is currently part of a resolved match,
    /// pending removal.
    pub const fn is_matched(&self) -> bool {
        self.matched_at.is_some()
    }

    /// The time at which this token was matched, if it currently is.
    pub const fn matched_at(&self) -> Option<InGameTime> {
        self.matched_at
    }

    /// Whether this token has been removed from play and awaits respawn.
    pub const fn is_blank(&self) -> bool {
        self.blank
    }
}

/// A position on the playing grid, row-major from the top-left cell.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPos {
    /// Row index, `0` being the topmost (spawning) row.
    pub row: usize,
    /// Column index, `0` being the leftmost column.
    pub col: usize,
}

impl GridPos {
    /// Creates a grid position from row and column indices.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// One of the four compass directions a swap can be aimed at, or none.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// No direction; resolves to the origin cell itself.
    #[default]
    None = 0,
    /// One row up.
    Up,
    /// One row down.
    Down,
    /// One column left.
    Left,
    /// One column right.
    Right,
}

impl Direction {
    /// The four actual compass directions, excluding [`Direction::None`].
    pub const CARDINAL: [Self; 4] = {
        use Direction::*;
        [Up, Down, Left, Right]
    };

    /// The `(row, col)` offset this direction stands for.
    pub const fn offset(&self) -> (isize, isize) {
        match self {
            Direction::None => (0, 0),
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

/// Where a swap should move the token at its origin cell.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SwapTarget {
    /// An explicit destination cell.
    At(GridPos),
    /// The cell adjacent to the origin in the given direction.
    Toward(Direction),
}

/// One shape pattern found on the grid by match detection.
///
/// Produced transiently per detection pass and never persisted.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchResult {
    /// Index of the matching shape in the board's shape registry.
    pub shape_index: usize,
    /// Rank of the matching shape; larger/rarer patterns rank higher.
    pub rank: u32,
    /// Which clockwise quarter-turn of the shape's mask matched (0–3).
    pub rotation: u8,
    /// Every grid position covered by a `true` mask cell, in row-major
    /// order of the rotated mask.
    pub positions: Vec<GridPos>,
    /// The shape's center cell, rotated along with the mask and resolved
    /// onto the grid.
    pub center: GridPos,
}

impl MatchResult {
    /// Whether the given position is a member of this match.
    pub fn contains(&self, pos: GridPos) -> bool {
        self.positions.contains(&pos)
    }
}

/// Configuration options of the board, which can be modified without hurting
/// internal invariants.
///
/// # Reproducibility
/// Modifying a [`Board`]'s configuration after it was created might not make
/// it easily reproducible anymore.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Configuration {
    /// Number of rows of the playing grid.
    pub row_count: usize,
    /// Number of columns of the playing grid.
    pub col_count: usize,
    /// The shape patterns detected on the board, in registry order.
    ///
    /// Registry order is part of the documented match tie-break and should
    /// stay fixed for the life of the board.
    pub shapes: Vec<Shape>,
    /// How often tokens fall one cell into blank space below them while the
    /// board is settling.
    pub gravity_interval: Duration,
    /// How long a matched token animates before it becomes blank.
    pub removal_duration: Duration,
    /// How often the board checks that at least one move anywhere could
    /// still produce a match.
    pub liveness_interval: Duration,
    /// How many times startup stabilization may replace matched tokens
    /// before discarding the grid entirely.
    pub stabilize_pass_budget: u32,
    /// How many times startup stabilization may regenerate the entire grid
    /// before construction fails.
    pub board_reset_budget: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            row_count: 10,
            col_count: 10,
            shapes: default_shapes(),
            gravity_interval: Duration::from_millis(100),
            removal_duration: Duration::from_millis(300),
            liveness_interval: Duration::from_millis(2000),
            stabilize_pass_budget: 16,
            board_reset_budget: 8,
        }
    }
}

/// Some values that were used to help initialize the board.
///
/// Used for board reproducibility.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateInitialization {
    /// The value to seed the board's PRNG with.
    pub seed: u64,
    /// The method (and weights) of token generation used.
    pub token_generator: TokenGenerator,
}

/// Struct storing internal board state that changes over the course of play.
#[derive(Eq, PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct State {
    /// Current in-game time.
    pub time: InGameTime,
    /// The internal pseudo random number generator used.
    pub rng: BoardRng,
    /// The method (and weights) of token generation used.
    pub token_generator: TokenGenerator,
    /// The playing grid.
    pub grid: Grid,
    /// The time at which the next gravity step is due.
    pub gravity_step_scheduled: InGameTime,
    /// The time at which the next liveness check is due.
    pub liveness_check_scheduled: InGameTime,
    /// Whether the liveness check found the board stuck; consumed by the
    /// next update, which reshuffles the grid.
    pub needs_shuffle: bool,
    /// At most one queued player swap, applied at the start of the next
    /// update.
    pub pending_swap: Option<(GridPos, SwapTarget)>,
    /// The endpoints of the most recent swap, consumed as a tie-break by
    /// the next match resolution.
    pub last_swap: Option<(GridPos, GridPos)>,
    /// Total number of distinct tokens matched so far.
    pub tokens_matched: u64,
    /// Total number of full-grid reshuffles performed so far.
    pub shuffles_performed: u32,
}

/// Main board struct representing a running match-3 simulation.
///
/// External input and rendering collaborators talk to the board through
/// [`Board::request_swap`]/[`Board::swap_tiles`], the grid read accessors,
/// and the [`FeedbackMsg`]s returned from [`Board::update`].
#[derive(Eq, PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Board {
    /// Some internal configuration options of the `Board`.
    ///
    /// # Reproducibility
    /// Modifying a `Board`'s configuration after it was created might not
    /// make it easily reproducible anymore.
    pub config: Configuration,
    pub(crate) state_init: StateInitialization,
    pub(crate) state: State,
}

/// A number of feedback events that can be returned by the board.
///
/// These can be used to more easily tally scores or render visual feedback
/// to the player.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Feedback {
    /// A token was matched and scheduled for removal.
    ///
    /// Fired once per distinct token per resolution pass.
    TokenMatched {
        /// Identity of the matched token.
        id: TokenId,
        /// Kind of the matched token, for per-kind score tallies.
        kind: String,
        /// Where the token sat when it was matched.
        position: GridPos,
        /// The variant the token carried when it was matched.
        variant: Variant,
    },
    /// A matched token was promoted to a special variant instead of being
    /// removed.
    TokenPromoted {
        /// Identity of the promoted token.
        id: TokenId,
        /// Kind of the promoted token.
        kind: String,
        /// Where the token sat when it was promoted.
        position: GridPos,
        /// The special variant the token now carries.
        variant: Variant,
    },
    /// A queued swap request was applied to the grid.
    SwapApplied {
        /// The cell the swap originated from.
        origin: GridPos,
        /// The cell the origin token was moved to.
        destination: GridPos,
    },
    /// The board had no possible matching move left and was fully
    /// reshuffled.
    BoardShuffled,
}

/// An error thrown when constructing a [`Token`] with an empty kind.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewTokenError;

impl fmt::Display for NewTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tokens must have a non-empty kind")
    }
}

impl std::error::Error for NewTokenError {}

/// An error that can be thrown when constructing a [`Grid`] from rows.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NewGridError {
    /// The row input was empty or contained an empty row.
    Empty,
    /// Not all rows had the same length.
    RaggedRows,
}

impl fmt::Display for NewGridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NewGridError::Empty => "grids must have at least one row and one column",
            NewGridError::RaggedRows => "grid rows must all be the same length",
        };
        write!(f, "{s}")
    }
}

impl std::error::Error for NewGridError {}

/// An error describing an invalid [`TokenGenerator`] registry.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeneratorError {
    /// The registry contained no token kinds at all.
    NoKinds,
    /// A registered kind name was empty.
    EmptyKind,
    /// The same kind name was registered twice.
    DuplicateKind(String),
    /// A registered kind had generation weight zero.
    ZeroWeight(String),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::NoKinds => write!(f, "token generator has no registered kinds"),
            GeneratorError::EmptyKind => write!(f, "token kinds must be non-empty"),
            GeneratorError::DuplicateKind(kind) => {
                write!(f, "token kind {kind:?} registered twice")
            }
            GeneratorError::ZeroWeight(kind) => {
                write!(f, "token kind {kind:?} has generation weight zero")
            }
        }
    }
}

impl std::error::Error for GeneratorError {}

/// An error that can be thrown by [`BoardBuilder::build`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuildBoardError {
    /// The requested grid had zero rows or zero columns.
    ZeroDimension,
    /// The token generation registry was invalid.
    Generator(GeneratorError),
    /// Startup stabilization exhausted both its pass and reset budgets
    /// without producing a match-free grid.
    Unstabilized,
}

impl From<GeneratorError> for BuildBoardError {
    fn from(e: GeneratorError) -> Self {
        BuildBoardError::Generator(e)
    }
}

impl fmt::Display for BuildBoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildBoardError::ZeroDimension => {
                write!(f, "boards must have at least one row and one column")
            }
            BuildBoardError::Generator(e) => write!(f, "{e}"),
            BuildBoardError::Unstabilized => {
                write!(f, "could not stabilize a freshly generated board into a match-free state")
            }
        }
    }
}

impl std::error::Error for BuildBoardError {}

/// An error that can be thrown by [`Board::update`]: an attempt to update
/// the board to a timestamp it already passed (`now < board.state().time`).
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateBoardError;

impl fmt::Display for UpdateBoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt to update board to a timestamp it already passed")
    }
}

impl std::error::Error for UpdateBoardError {}

impl Board {
    /// Creates a blank new template representing a yet-to-be-started
    /// [`Board`] ready for configuration.
    pub fn builder() -> BoardBuilder {
        BoardBuilder::default()
    }

    /// Read accessor for the board's initial values.
    pub const fn state_init(&self) -> &StateInitialization {
        &self.state_init
    }

    /// Read accessor for the current board state.
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Read accessor for the playing grid.
    pub const fn grid(&self) -> &Grid {
        &self.state.grid
    }

    /// The grid's rows, topmost first.
    pub fn rows(&self) -> &[Vec<Token>] {
        self.state.grid.rows()
    }

    /// The grid's columns as a derived view, leftmost first.
    pub fn columns(&self) -> Vec<Vec<&Token>> {
        self.state.grid.columns()
    }

    /// Iterator over all tokens on the grid in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Token> {
        self.state.grid.tiles()
    }

    /// The token kinds this board generates, in registry order.
    pub fn tile_kinds(&self) -> Vec<&str> {
        self.state.token_generator.kinds()
    }

    /// The token at the given position, or `None` if out of bounds.
    pub fn tile_at(&self, pos: GridPos) -> Option<&Token> {
        self.state.grid.get(pos)
    }

    /// Queues a player swap to be applied at the start of the next update.
    ///
    /// At most one swap may be pending at a time; a second request, or one
    /// whose endpoints are out of bounds or blank, is rejected and `false`
    /// is returned.
    pub fn request_swap(&mut self, origin: GridPos, target: SwapTarget) -> bool {
        if self.state.pending_swap.is_some() || self.resolve_swap(origin, target).is_none() {
            return false;
        }
        self.state.pending_swap = Some((origin, target));
        true
    }

    /// Immediately exchanges the tokens at `origin` and the target cell.
    ///
    /// Swapping with an out-of-bounds or blank cell is absorbed as a no-op
    /// (`false`); such requests arise routinely from boundary input.
    /// Swapping the same pair twice restores the original state, which lets
    /// callers revert an unproductive swap after consulting
    /// [`Board::match_shapes`].
    pub fn swap_tiles(&mut self, origin: GridPos, target: SwapTarget) -> bool {
        let Some(destination) = self.resolve_swap(origin, target) else {
            return false;
        };
        self.state.grid.swap(origin, destination);
        self.state.last_swap = Some((origin, destination));
        true
    }

    /// Resolves a swap target to a destination cell, or `None` if either
    /// endpoint is out of bounds or blank.
    pub(crate) fn resolve_swap(&self, origin: GridPos, target: SwapTarget) -> Option<GridPos> {
        let destination = match target {
            SwapTarget::At(pos) => self.state.grid.contains(pos).then_some(pos)?,
            SwapTarget::Toward(direction) => self.state.grid.adjacent(origin, direction)?,
        };
        let origin_blank = self.state.grid.get(origin)?.is_blank();
        let destination_blank = self.state.grid.get(destination)?.is_blank();
        (!origin_blank && !destination_blank).then_some(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_requires_kind() {
        assert!(Token::new("red").is_ok());
        assert_eq!(Token::new(""), Err(NewTokenError));
    }

    #[test]
    fn token_starts_mundane_and_in_play() {
        let token = Token::new("a").unwrap();
        assert_eq!(token.variant(), Variant::Mundane);
        assert_eq!(token.value(), 1);
        assert!(!token.is_matched());
        assert!(!token.is_blank());
    }

    #[test]
    fn direction_offsets_are_unit_steps() {
        assert_eq!(Direction::None.offset(), (0, 0));
        for direction in Direction::CARDINAL {
            let (dr, dc) = direction.offset();
            assert_eq!(dr.abs() + dc.abs(), 1);
        }
    }
}
