/*!
This module handles what happens when [`Board::update`] is called: the
per-tick cascade resolution of spawning, gravity, match detection, special
token promotion, explosion propagation and removal scheduling.
*/

use rand::Rng;

use crate::{
    grid::Grid,
    shape::{bomb_shape, Shape},
    Board, BoardRng, Feedback, FeedbackMsg, GridPos, InGameTime, MatchResult, Token,
    UpdateBoardError, Variant,
};

impl Board {
    /// The main function used to advance the board state.
    ///
    /// This advances the simulation up to and including the given `now`,
    /// processing a strict sequence of phases: queued swap application,
    /// removal deadline expiry, one gravity step when due, top-row spawning,
    /// the settling gate, reshuffling when the liveness check flagged a
    /// stuck board, and finally match detection and resolution. Each phase
    /// completes before the next begins.
    ///
    /// Returns all [`FeedbackMsg`]s caused by this call, in order.
    ///
    /// # Errors
    ///
    /// This function may error with [`UpdateBoardError`] if
    /// `now < board.state().time`, indicating that the requested update
    /// lies in the past.
    pub fn update(&mut self, now: InGameTime) -> Result<Vec<FeedbackMsg>, UpdateBoardError> {
        if now < self.state.time {
            return Err(UpdateBoardError);
        }
        self.state.time = now;
        let mut msgs: Vec<FeedbackMsg> = Vec::new();

        // Apply at most one queued player swap, synchronously between ticks.
        if let Some((origin, target)) = self.state.pending_swap.take() {
            // Endpoints are re-validated now; they may have gone blank since
            // the request was queued.
            if let Some(destination) = self.resolve_swap(origin, target) {
                self.state.grid.swap(origin, destination);
                self.state.last_swap = Some((origin, destination));
                msgs.push((now, Feedback::SwapApplied { origin, destination }));
            }
        }

        let Board { config, state, .. } = self;

        // Matched tokens whose removal deadline passed leave play.
        do_expire_removals(&mut state.grid, now);

        // One gravity step per due interval; tokens fall a single cell.
        if state.gravity_step_scheduled <= now {
            do_gravity_step(&mut state.grid);
            state.gravity_step_scheduled = now + config.gravity_interval;
        }

        // Blank cells in the topmost row respawn as fresh mundane tokens.
        do_spawn(&mut state.grid, &state.token_generator, &mut state.rng);

        // Consume the liveness flag. Reshuffling bypasses the settle gate:
        // a stuck board must never stay stuck.
        if state.needs_shuffle {
            do_shuffle(&mut state.grid, &mut state.rng);
            state.needs_shuffle = false;
            state.shuffles_performed += 1;
            msgs.push((now, Feedback::BoardShuffled));
        }

        // Settling gate: while tokens below the top row are still dropping
        // or animating out, no match detection runs.
        if !is_settled(&state.grid) {
            return Ok(msgs);
        }

        let mut matches = detect_matches(&state.grid, &config.shapes);
        if matches.is_empty() {
            // The board is settled and idle; on a slower cadence, verify
            // that some move anywhere could still produce a match.
            if state.liveness_check_scheduled <= now {
                state.needs_shuffle = !any_move_matches(&mut state.grid, &config.shapes);
                state.liveness_check_scheduled = now + config.liveness_interval;
            }
            return Ok(msgs);
        }

        prioritize(&mut matches, state.last_swap);

        let marked = do_resolve(
            &mut state.grid,
            &config.shapes,
            &matches,
            state.last_swap,
            now,
            config.removal_duration,
            &mut msgs,
        );
        state.tokens_matched += marked as u64;

        // The player's move has determined this resolution; later cascade
        // passes fall back to pure detection order.
        state.last_swap = None;

        Ok(msgs)
    }

    /// Read-only query returning all match results currently present on the
    /// grid, in detection order.
    ///
    /// Callers can use this to validate a swap before committing to it and
    /// revert an unproductive one via a second [`Board::swap_tiles`].
    pub fn match_shapes(&self) -> Vec<MatchResult> {
        detect_matches(&self.state.grid, &self.config.shapes)
    }
}

/// Exhaustively finds all (shape, rotation, position) matches anywhere on
/// the grid: for every column offset, for every registered shape, for every
/// row offset. Duplicates across overlapping windows are expected and
/// resolved by prioritization and idempotent marking.
pub(crate) fn detect_matches(grid: &Grid, shapes: &[Shape]) -> Vec<MatchResult> {
    let mut results = Vec::new();
    for col in 0..grid.col_count() {
        for (shape_index, shape) in shapes.iter().enumerate() {
            for row in 0..grid.row_count() {
                if let Some(result) = shape.matches(grid, GridPos::new(row, col), shape_index) {
                    results.push(result);
                }
            }
        }
    }
    results
}

/// Whether any match exists anywhere on the grid; early-exit counterpart of
/// [`detect_matches`].
fn has_any_match(grid: &Grid, shapes: &[Shape]) -> bool {
    shapes.iter().enumerate().any(|(shape_index, shape)| {
        grid.positions()
            .any(|pos| shape.matches(grid, pos, shape_index).is_some())
    })
}

/// The liveness check: for every cell and every compass direction,
/// hypothetically swap-and-revert and test whether any match would result.
///
/// The grid is restored before returning; the `&mut` is purely internal.
pub(crate) fn any_move_matches(grid: &mut Grid, shapes: &[Shape]) -> bool {
    let positions: Vec<GridPos> = grid.positions().collect();
    for pos in positions {
        for direction in crate::Direction::CARDINAL {
            let Some(destination) = grid.adjacent(pos, direction) else {
                continue;
            };
            grid.swap(pos, destination);
            let found = has_any_match(grid, shapes);
            grid.swap(pos, destination);
            if found {
                return true;
            }
        }
    }
    false
}

/// Sorts match results by shape rank descending, breaking ties in favor of
/// matches containing the token the player just moved. Remaining ties keep
/// detection order (the sort is stable), which is the documented tie-break.
fn prioritize(matches: &mut [MatchResult], last_swap: Option<(GridPos, GridPos)>) {
    matches.sort_by_key(|result| {
        let involves_swap = last_swap.is_some_and(|(origin, destination)| {
            result.contains(origin) || result.contains(destination)
        });
        (std::cmp::Reverse(result.rank), !involves_swap)
    });
}

/// Processes prioritized matches: idempotent match-marking, transcendent
/// variant recording (first-writer-wins), explosion propagation, promotion
/// application, removal scheduling and notification.
///
/// Returns the number of distinct tokens marked in this pass.
fn do_resolve(
    grid: &mut Grid,
    shapes: &[Shape],
    matches: &[MatchResult],
    last_swap: Option<(GridPos, GridPos)>,
    now: InGameTime,
    removal_duration: InGameTime,
    msgs: &mut Vec<FeedbackMsg>,
) -> usize {
    // Distinct tokens marked this pass, in marking order.
    let mut marked: Vec<GridPos> = Vec::new();
    // Special tokens marked this pass whose area effect is yet to go off.
    let mut fuses: Vec<GridPos> = Vec::new();
    // Recorded promotions; the first match to propose a variant for a
    // token wins across overlapping matches.
    let mut promotions: Vec<(GridPos, Variant)> = Vec::new();

    for result in matches {
        for &pos in &result.positions {
            mark(grid, pos, now, &mut marked, &mut fuses);
        }

        if let Some(variant) = shapes[result.shape_index].promotion(result.rotation) {
            // The transcendent token is the one the player moved if it is a
            // member, else the shape's center token.
            let transcendent = last_swap
                .and_then(|(origin, destination)| {
                    if result.contains(destination) {
                        Some(destination)
                    } else if result.contains(origin) {
                        Some(origin)
                    } else {
                        None
                    }
                })
                .unwrap_or(result.center);
            if !promotions.iter().any(|&(pos, _)| pos == transcendent) {
                promotions.push((transcendent, variant));
            }
        }
    }

    // Explosion propagation: each special token's area effect marks its
    // casualties, which may light further fuses. The already-matched guard
    // in `mark` terminates chains even with cyclic adjacency.
    while let Some(pos) = fuses.pop() {
        for casualty in explosion_area(grid, pos) {
            mark(grid, casualty, now, &mut marked, &mut fuses);
        }
    }

    // Transcendent tokens become the new special token instead of being
    // removed: variant applied, match flag cleared.
    for &(pos, variant) in &promotions {
        let Some(token) = grid.get_mut(pos) else {
            continue;
        };
        token.variant = variant;
        token.matched_at = None;
        token.blank_at = None;
    }

    // Every other matched token is scheduled to leave play once its
    // removal animation has run.
    for &pos in &marked {
        let Some(token) = grid.get_mut(pos) else {
            continue;
        };
        if token.matched_at.is_some() {
            token.blank_at = Some(now + removal_duration);
        }
    }

    // Report each distinct matched or promoted token exactly once.
    for &pos in &marked {
        let Some(token) = grid.get(pos) else {
            continue;
        };
        let promotion = promotions
            .iter()
            .find_map(|&(p, variant)| (p == pos).then_some(variant));
        let feedback = match promotion {
            Some(variant) => Feedback::TokenPromoted {
                id: token.id(),
                kind: token.kind().to_string(),
                position: pos,
                variant,
            },
            None => Feedback::TokenMatched {
                id: token.id(),
                kind: token.kind().to_string(),
                position: pos,
                variant: token.variant(),
            },
        };
        msgs.push((now, feedback));
    }

    marked.len()
}

/// Marks the token at `pos` as matched, recording it as a casualty and
/// lighting its fuse if it carries a special variant.
///
/// Idempotent: a blank or already-matched token is a no-op, which prevents
/// double-processing and infinite explosion propagation.
fn mark(
    grid: &mut Grid,
    pos: GridPos,
    now: InGameTime,
    marked: &mut Vec<GridPos>,
    fuses: &mut Vec<GridPos>,
) -> bool {
    let Some(token) = grid.get_mut(pos) else {
        return false;
    };
    if token.blank || token.matched_at.is_some() {
        return false;
    }
    token.matched_at = Some(now);
    marked.push(pos);
    if token.variant != Variant::Mundane {
        fuses.push(pos);
    }
    true
}

/// The grid positions affected by the area effect of the special token at
/// `pos`.
fn explosion_area(grid: &Grid, pos: GridPos) -> Vec<GridPos> {
    let Some(token) = grid.get(pos) else {
        return Vec::new();
    };
    let row = |r: usize| (0..grid.col_count()).map(move |c| GridPos::new(r, c));
    let col = |c: usize| (0..grid.row_count()).map(move |r| GridPos::new(r, c));
    match token.variant() {
        Variant::Mundane => Vec::new(),
        Variant::HorizontalClear => row(pos.row).collect(),
        Variant::VerticalClear => col(pos.col).collect(),
        Variant::CrossClear => row(pos.row).chain(col(pos.col)).collect(),
        Variant::TypeClear => {
            let kind = token.kind();
            grid.positions()
                .filter(|&p| grid.get(p).is_some_and(|t| t.kind() == kind))
                .collect()
        }
        Variant::BombClear => {
            let center = bomb_shape().center_cell();
            let offset = (
                pos.row as isize - center.row as isize,
                pos.col as isize - center.col as isize,
            );
            bomb_shape().screen(grid, offset)
        }
    }
}

/// Matched tokens whose removal deadline passed become blank, awaiting
/// respawn.
fn do_expire_removals(grid: &mut Grid, now: InGameTime) {
    let positions: Vec<GridPos> = grid.positions().collect();
    for pos in positions {
        let Some(token) = grid.get_mut(pos) else {
            continue;
        };
        if token.blank_at.is_some_and(|deadline| deadline <= now) {
            token.blank = true;
            token.matched_at = None;
            token.blank_at = None;
        }
    }
}

/// One gravity step: in every column, tokens directly above a blank cell
/// fall one cell down. Repeated steps settle the whole board.
fn do_gravity_step(grid: &mut Grid) {
    for col in 0..grid.col_count() {
        for row in (1..grid.row_count()).rev() {
            let below = GridPos::new(row, col);
            let above = GridPos::new(row - 1, col);
            let below_blank = grid.get(below).is_some_and(Token::is_blank);
            let above_blank = grid.get(above).is_some_and(Token::is_blank);
            if below_blank && !above_blank {
                grid.swap(above, below);
            }
        }
    }
}

/// Every blank cell in the topmost row is replaced with a freshly generated
/// mundane token.
fn do_spawn(grid: &mut Grid, token_generator: &crate::TokenGenerator, rng: &mut BoardRng) {
    for col in 0..grid.col_count() {
        let pos = GridPos::new(0, col);
        if grid.get(pos).is_some_and(Token::is_blank) {
            // SAFETY: Registry invariant, a validated generator never runs dry.
            let token = token_generator
                .with_rng(rng, Variant::Mundane)
                .next()
                .unwrap();
            grid.respawn(pos, token);
        }
    }
}

/// Fisher-Yates permutation of all token positions.
fn do_shuffle(grid: &mut Grid, rng: &mut BoardRng) {
    let positions: Vec<GridPos> = grid.positions().collect();
    for i in (1..positions.len()).rev() {
        let j = rng.random_range(0..=i);
        grid.swap(positions[i], positions[j]);
    }
}

/// Whether the board has finished dropping and animating: no token below
/// the top row is blank or matched-pending-removal.
fn is_settled(grid: &Grid) -> bool {
    grid.rows()
        .iter()
        .skip(1)
        .flatten()
        .all(|token| !token.is_blank() && !token.is_matched())
}
