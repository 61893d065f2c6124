/*!
This module handles creation / initialization / building of [`Board`]s,
including startup stabilization.
*/

use std::time::Duration;

use rand_chacha::rand_core::SeedableRng;

use crate::{
    board_update::detect_matches, grid::Grid, shape::Shape, token_generator::TokenGenerator,
    Board, BoardRng, BuildBoardError, Configuration, State, StateInitialization, Variant,
};

/// This builder exposes the ability to configure a new [`Board`] to varying
/// degrees.
///
/// Generally speaking, when using `BoardBuilder`, you'll first call
/// [`BoardBuilder::new`] or [`Board::builder`], then chain calls to methods
/// to set each field, then call [`BoardBuilder::build`].
/// This will give you a [`Board`] as specified that you can then use as
/// normal. The `BoardBuilder` is not used up and its configuration can be
/// re-used to initialize more [`Board`]s.
#[derive(Eq, PartialEq, Clone, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardBuilder {
    /// Many of the configuration options that will be set for the board.
    pub config: Configuration,
    /// The value to seed the board's PRNG with.
    pub seed: Option<u64>,
    /// The method (and weights) of token generation used.
    pub token_generator: Option<TokenGenerator>,
}

impl BoardBuilder {
    /// Creates a blank new template representing a yet-to-be-started
    /// [`Board`] ready for configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`Board`] with the information specified by `self`.
    ///
    /// The freshly generated grid is stabilized before it is handed out:
    /// matched tokens are repeatedly replaced with new mundane tokens,
    /// bounded by the configured pass budget, and the whole grid is
    /// regenerated when that budget runs out, bounded by the reset budget.
    /// A successfully built board contains zero pre-existing matches.
    ///
    /// # Errors
    ///
    /// Fails with [`BuildBoardError`] if the requested grid has a zero
    /// dimension, the token generation registry is invalid, or both
    /// stabilization budgets run out.
    pub fn build(&self) -> Result<Board, BuildBoardError> {
        let config = self.config.clone();
        if config.row_count == 0 || config.col_count == 0 {
            return Err(BuildBoardError::ZeroDimension);
        }

        let token_generator = self.token_generator.clone().unwrap_or_default();
        token_generator.validate()?;

        let seed = self.seed.unwrap_or_else(rand::random);
        let mut rng = BoardRng::seed_from_u64(seed);

        let grid = stabilized_grid(&config, &token_generator, &mut rng)?;

        Ok(Board {
            state_init: StateInitialization {
                seed,
                token_generator: token_generator.clone(),
            },
            state: State {
                time: Duration::ZERO,
                rng,
                token_generator,
                grid,
                gravity_step_scheduled: config.gravity_interval,
                liveness_check_scheduled: config.liveness_interval,
                needs_shuffle: false,
                pending_swap: None,
                last_swap: None,
                tokens_matched: 0,
                shuffles_performed: 0,
            },
            config,
        })
    }

    /// Sets the [`Configuration`] that will be used by [`Board`].
    pub fn config(&mut self, x: Configuration) -> &mut Self {
        self.config = x;
        self
    }

    /// Number of rows of the playing grid.
    pub fn row_count(&mut self, x: usize) -> &mut Self {
        self.config.row_count = x;
        self
    }
    /// Number of columns of the playing grid.
    pub fn col_count(&mut self, x: usize) -> &mut Self {
        self.config.col_count = x;
        self
    }
    /// The shape patterns detected on the board, in registry order.
    pub fn shapes(&mut self, x: Vec<Shape>) -> &mut Self {
        self.config.shapes = x;
        self
    }
    /// How often tokens fall one cell into blank space below them while the
    /// board is settling.
    pub fn gravity_interval(&mut self, x: Duration) -> &mut Self {
        self.config.gravity_interval = x;
        self
    }
    /// How long a matched token animates before it becomes blank.
    pub fn removal_duration(&mut self, x: Duration) -> &mut Self {
        self.config.removal_duration = x;
        self
    }
    /// How often the board checks that at least one move anywhere could
    /// still produce a match.
    pub fn liveness_interval(&mut self, x: Duration) -> &mut Self {
        self.config.liveness_interval = x;
        self
    }
    /// How many times startup stabilization may replace matched tokens
    /// before discarding the grid entirely.
    pub fn stabilize_pass_budget(&mut self, x: u32) -> &mut Self {
        self.config.stabilize_pass_budget = x;
        self
    }
    /// How many times startup stabilization may regenerate the entire grid
    /// before construction fails.
    pub fn board_reset_budget(&mut self, x: u32) -> &mut Self {
        self.config.board_reset_budget = x;
        self
    }

    /// The value to seed the board's PRNG with.
    pub fn seed(&mut self, x: u64) -> &mut Self {
        self.seed = Some(x);
        self
    }
    /// The method (and weights) of token generation used.
    pub fn token_generator(&mut self, x: TokenGenerator) -> &mut Self {
        self.token_generator = Some(x);
        self
    }
}

/// Generates grids until one can be stabilized into a match-free state.
fn stabilized_grid(
    config: &Configuration,
    token_generator: &TokenGenerator,
    rng: &mut BoardRng,
) -> Result<Grid, BuildBoardError> {
    let mut generate = |rng: &mut BoardRng| {
        // SAFETY: Registry invariant, a validated generator never runs dry.
        token_generator
            .with_rng(rng, Variant::Mundane)
            .next()
            .unwrap()
    };

    for _reset in 0..=config.board_reset_budget {
        let mut grid = Grid::generate(config.row_count, config.col_count, || generate(rng));

        for _pass in 0..=config.stabilize_pass_budget {
            let matches = detect_matches(&grid, &config.shapes);
            if matches.is_empty() {
                return Ok(grid);
            }
            // Replace only the matched tokens and try again.
            let mut replaced = Vec::new();
            for result in matches {
                for pos in result.positions {
                    if !replaced.contains(&pos) {
                        grid.respawn(pos, generate(rng));
                        replaced.push(pos);
                    }
                }
            }
        }
        // Pass budget exhausted: discard and regenerate the whole grid.
    }
    Err(BuildBoardError::Unstabilized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeneratorError;

    #[test]
    fn fresh_boards_are_stabilized() {
        for seed in 0..8 {
            let board = Board::builder().seed(seed).build().unwrap();
            assert!(board.match_shapes().is_empty(), "seed = {seed}");
        }
    }

    #[test]
    fn builds_are_reproducible_from_a_seed() {
        let a = Board::builder().seed(123).build().unwrap();
        let b = Board::builder().seed(123).build().unwrap();
        assert_eq!(a.grid(), b.grid());
    }

    #[test]
    fn dimensions_and_registry_are_validated() {
        assert_eq!(
            Board::builder().row_count(0).build(),
            Err(BuildBoardError::ZeroDimension)
        );
        assert_eq!(
            Board::builder()
                .token_generator(TokenGenerator::uniform(["a", "a"]))
                .build(),
            Err(BuildBoardError::Generator(GeneratorError::DuplicateKind(
                "a".to_string()
            )))
        );
    }

    #[test]
    fn single_kind_boards_cannot_stabilize() {
        // Every cell shares one kind, so matches always exist.
        let result = Board::builder()
            .seed(1)
            .token_generator(TokenGenerator::uniform(["only"]))
            .build();
        assert_eq!(result, Err(BuildBoardError::Unstabilized));
    }

    #[test]
    fn builder_configuration_reaches_the_board() {
        let board = Board::builder()
            .seed(9)
            .row_count(6)
            .col_count(7)
            .removal_duration(Duration::from_millis(50))
            .build()
            .unwrap();
        assert_eq!(board.grid().row_count(), 6);
        assert_eq!(board.grid().col_count(), 7);
        assert_eq!(board.config.removal_duration, Duration::from_millis(50));
        assert_eq!(board.tile_kinds(), vec!["a", "b", "c", "d"]);
    }
}
