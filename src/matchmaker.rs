use crate::divider::{build_divider, TeamDivider};
use crate::error::SimError;
use crate::finder::{CandidateFinder, WindowFinder};
use crate::types::{Candidate, Game, SimulationConfig, WindowMode};
use rand::RngCore;

/// Produces one game around a given seed
pub trait TeamChooser {
    fn choose_teams(
        &mut self,
        pool: &[Candidate],
        seed: Candidate,
        players_per_team: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Game, SimError>;
}

pub fn build_team_chooser(config: &SimulationConfig) -> Box<dyn TeamChooser> {
    let divider = build_divider(config.division_strategy, config.num_close);
    let finder = Box::new(WindowFinder);
    match config.window_mode {
        WindowMode::Expanding => Box::new(WindowExpandingMatcher::new(
            divider,
            finder,
            config.initial_window,
            config.min_rating,
            config.max_rating,
        )),
        WindowMode::Fixed => Box::new(FixedWindowMatcher::new(divider, finder, config.initial_window)),
    }
}

/// Inclusive rating range searched around a seed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowBounds {
    pub min: i32,
    pub max: i32,
}

/// Range of width `window` centered on the seed. When one side would cross a
/// rating bound it is pinned there and the other side is pushed outward.
pub fn window_bounds(seed_rating: i32, window: i32, min_rating: i32, max_rating: i32) -> WindowBounds {
    let (seed, half) = (seed_rating as i64, (window / 2) as i64);
    let (lo, hi) = (min_rating as i64, max_rating as i64);
    let (min, max) = if seed + half > hi {
        (seed - half - (hi - seed), hi)
    } else if seed - half < lo {
        (lo, seed + half + (seed - lo))
    } else {
        (seed - half, seed + half)
    };
    // widened in i64, saturated back into i32
    let narrow = |v: i64| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    WindowBounds {
        min: narrow(min),
        max: narrow(max),
    }
}

/// Most windows the expanding search can try before giving up:
/// `ceil(log2(span / initial)) + 1`, and at least one.
pub fn max_window_attempts(initial_window: i32, span: i32) -> usize {
    if initial_window >= span {
        return 1;
    }
    (span as f64 / initial_window as f64).log2().ceil() as usize + 1
}

/// Outcome of one expanding search
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSearch {
    pub game: Game,
    /// Windows tried, including the successful one
    pub attempts: usize,
    /// Width of the last window tried
    pub final_window: i32,
}

/// Finds at least `2n` players around `seed`, doubling the window until it
/// covers `[min_rating, max_rating]`, then hands them to `divider`.
#[allow(clippy::too_many_arguments)]
pub fn search_window(
    pool: &[Candidate],
    seed: Candidate,
    players_per_team: usize,
    divider: &mut dyn TeamDivider,
    finder: &dyn CandidateFinder,
    initial_window: i32,
    min_rating: i32,
    max_rating: i32,
    rng: &mut dyn RngCore,
) -> Result<WindowSearch, SimError> {
    let span = max_rating.saturating_sub(min_rating);
    let limit = max_window_attempts(initial_window, span);
    let mut window = initial_window;
    let mut attempts = 0;

    loop {
        attempts += 1;
        debug_assert!(attempts <= limit, "window search exceeded {} attempts", limit);

        let bounds = window_bounds(seed.rating, window, min_rating, max_rating);
        let mut candidates = finder.find(pool, bounds.max, bounds.max.saturating_sub(bounds.min));
        if !candidates.iter().any(|c| c.id == seed.id) {
            candidates.push(seed);
        }

        if candidates.len() >= 2 * players_per_team {
            candidates.retain(|c| c.id != seed.id);
            let matchup = divider.divide(&candidates, players_per_team, seed, rng)?;
            return Ok(WindowSearch {
                game: Game::Matched(matchup),
                attempts,
                final_window: window,
            });
        }

        if window < span {
            log::trace!(
                "seed {} found {} of {} players in [{}, {}], widening window to {}",
                seed.id,
                candidates.len(),
                2 * players_per_team,
                bounds.min,
                bounds.max,
                window.saturating_mul(2)
            );
            window = window.saturating_mul(2);
        } else {
            return Ok(WindowSearch {
                game: Game::NoMatch,
                attempts,
                final_window: window,
            });
        }
    }
}

/// Seeded matcher with adaptive window growth
pub struct WindowExpandingMatcher {
    divider: Box<dyn TeamDivider>,
    finder: Box<dyn CandidateFinder>,
    initial_window: i32,
    min_rating: i32,
    max_rating: i32,
}

impl WindowExpandingMatcher {
    pub fn new(
        divider: Box<dyn TeamDivider>,
        finder: Box<dyn CandidateFinder>,
        initial_window: i32,
        min_rating: i32,
        max_rating: i32,
    ) -> Self {
        Self {
            divider,
            finder,
            initial_window,
            min_rating,
            max_rating,
        }
    }

    pub fn search(
        &mut self,
        pool: &[Candidate],
        seed: Candidate,
        players_per_team: usize,
        rng: &mut dyn RngCore,
    ) -> Result<WindowSearch, SimError> {
        search_window(
            pool,
            seed,
            players_per_team,
            self.divider.as_mut(),
            self.finder.as_ref(),
            self.initial_window,
            self.min_rating,
            self.max_rating,
            rng,
        )
    }
}

impl TeamChooser for WindowExpandingMatcher {
    fn choose_teams(
        &mut self,
        pool: &[Candidate],
        seed: Candidate,
        players_per_team: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Game, SimError> {
        Ok(self.search(pool, seed, players_per_team, rng)?.game)
    }
}

/// One-shot matcher: only players rated within `window` below the seed are
/// considered, and the window never grows.
pub struct FixedWindowMatcher {
    divider: Box<dyn TeamDivider>,
    finder: Box<dyn CandidateFinder>,
    window: i32,
}

impl FixedWindowMatcher {
    pub fn new(divider: Box<dyn TeamDivider>, finder: Box<dyn CandidateFinder>, window: i32) -> Self {
        Self { divider, finder, window }
    }
}

impl TeamChooser for FixedWindowMatcher {
    fn choose_teams(
        &mut self,
        pool: &[Candidate],
        seed: Candidate,
        players_per_team: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Game, SimError> {
        let mut candidates = self.finder.find(pool, seed.rating, self.window);
        candidates.retain(|c| c.id != seed.id);

        if candidates.len() + 1 < 2 * players_per_team {
            return Ok(Game::NoMatch);
        }
        let matchup = self.divider.divide(&candidates, players_per_team, seed, rng)?;
        Ok(Game::Matched(matchup))
    }
}
