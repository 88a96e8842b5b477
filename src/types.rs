use crate::error::{ConfigError, SimError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable player identity. All pools, teams and exclusion sets key off this.
pub type PlayerId = usize;

/// Lowest storable rating
pub const MIN_RATING: i32 = 0;
/// Highest storable rating
pub const MAX_RATING: i32 = 2800;
/// Rating every generated player starts from
pub const START_RATING: i32 = 1300;
/// Default rating update multiplier
pub const K_FACTOR: f64 = 50.0;
/// Largest magnitude accepted for configured rating bounds and windows. Keeps
/// window doubling and bound arithmetic inside `i32`.
pub const RATING_LIMIT: i32 = 1 << 28;

/// Append-only sequence of observed ratings. Never empty; the last entry is
/// the current rating. Every entry is clamped to `[MIN_RATING, MAX_RATING]`
/// when it is pushed.
#[derive(Clone, Debug, Serialize)]
pub struct RatingHistory {
    ratings: Vec<i32>,
}

impl RatingHistory {
    pub fn new(initial: i32) -> Self {
        let mut history = Self { ratings: Vec::with_capacity(8) };
        history.push(initial);
        history
    }

    pub(crate) fn push(&mut self, rating: i32) {
        self.ratings.push(rating.clamp(MIN_RATING, MAX_RATING));
    }

    pub fn current(&self) -> i32 {
        // `new` always pushes, so there is a last entry
        self.ratings.last().copied().unwrap_or(START_RATING)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.ratings
    }
}

/// A simulated player with a hidden true skill and an observed rating
#[derive(Clone, Debug, Serialize)]
pub struct Player {
    id: PlayerId,
    /// Latent ability; only the outcome engine reads it
    true_skill: i32,
    history: RatingHistory,
    wins: usize,
    losses: usize,
}

impl Player {
    pub fn new(id: PlayerId, true_skill: i32) -> Self {
        Self::with_rating(id, true_skill, START_RATING)
    }

    pub fn with_rating(id: PlayerId, true_skill: i32, rating: i32) -> Self {
        Self {
            id,
            true_skill,
            history: RatingHistory::new(rating),
            wins: 0,
            losses: 0,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn true_skill(&self) -> i32 {
        self.true_skill
    }

    pub fn rating(&self) -> i32 {
        self.history.current()
    }

    pub fn history(&self) -> &RatingHistory {
        &self.history
    }

    pub fn game_count(&self) -> usize {
        self.history.len() - 1
    }

    pub fn wins(&self) -> usize {
        self.wins
    }

    pub fn losses(&self) -> usize {
        self.losses
    }

    /// Observed rating minus true skill
    pub fn rating_error(&self) -> i32 {
        self.rating() - self.true_skill
    }

    /// Append the post-game rating and count the result
    pub(crate) fn record_game(&mut self, new_rating: i32, won: bool) {
        self.history.push(new_rating);
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
    }

    pub fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id,
            rating: self.rating(),
        }
    }
}

/// Snapshot of a player as seen by the matching components: identity plus
/// the rating at the time the pool was built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub id: PlayerId,
    pub rating: i32,
}

/// The full, persistent population. Insertion order is the canonical pool order.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
    index: HashMap<PlayerId, usize>,
}

impl Roster {
    pub fn new(players: Vec<Player>) -> Result<Self, ConfigError> {
        let mut roster = Self::default();
        for player in players {
            roster.push(player)?;
        }
        Ok(roster)
    }

    pub fn push(&mut self, player: Player) -> Result<(), ConfigError> {
        if self.index.contains_key(&player.id) {
            return Err(ConfigError::DuplicatePlayer(player.id));
        }
        self.index.insert(player.id, self.players.len());
        self.players.push(player);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.index.get(&id).map(|&i| &self.players[i])
    }

    pub(crate) fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        match self.index.get(&id) {
            Some(&i) => self.players.get_mut(i),
            None => None,
        }
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, SimError> {
        self.get(id).ok_or(SimError::UnknownPlayer(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Current ratings of every player, in roster order
    pub fn snapshot(&self) -> Vec<Candidate> {
        self.players.iter().map(Player::candidate).collect()
    }

    pub fn next_id(&self) -> PlayerId {
        self.players.iter().map(|p| p.id + 1).max().unwrap_or(0)
    }
}

/// One side of a game, as an ordered list of player ids
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub players: Vec<PlayerId>,
}

impl Team {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains(&id)
    }

    pub fn rating_sum(&self, roster: &Roster) -> Result<f64, SimError> {
        self.players
            .iter()
            .map(|&id| roster.player(id).map(|p| p.rating() as f64))
            .sum()
    }

    pub fn average_rating(&self, roster: &Roster) -> Result<f64, SimError> {
        Ok(self.rating_sum(roster)? / self.players.len() as f64)
    }

    pub fn true_skill_sum(&self, roster: &Roster) -> Result<f64, SimError> {
        self.players
            .iter()
            .map(|&id| roster.player(id).map(|p| p.true_skill() as f64))
            .sum()
    }

    pub fn average_true_skill(&self, roster: &Roster) -> Result<f64, SimError> {
        Ok(self.true_skill_sum(roster)? / self.players.len() as f64)
    }
}

/// Two assembled teams
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub team_a: Team,
    pub team_b: Team,
}

impl Matchup {
    pub fn new(team_a: Team, team_b: Team) -> Self {
        Self { team_a, team_b }
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.team_a
            .players
            .iter()
            .chain(self.team_b.players.iter())
            .copied()
    }
}

/// Result of one matching attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Game {
    Matched(Matchup),
    /// Not enough candidates could be assembled around the seed
    NoMatch,
}

impl Game {
    pub fn is_matched(&self) -> bool {
        matches!(self, Game::Matched(_))
    }

    pub fn into_matchup(self) -> Option<Matchup> {
        match self {
            Game::Matched(matchup) => Some(matchup),
            Game::NoMatch => None,
        }
    }
}

/// Non-overlapping games drawn from one pool snapshot
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Round {
    /// Games in creation order
    pub games: Vec<Matchup>,
    /// Matching attempts made, successful or not
    pub attempts: usize,
    /// Seeds that produced `NoMatch` and were excluded for the rest of the round
    pub ignored_seeds: usize,
    /// Players still in the pool when the round stopped
    pub unmatched: usize,
}

impl Round {
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.games.iter().flat_map(Matchup::player_ids)
    }
}

/// How the seed of each game attempt is picked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedStrategy {
    FirstAvailable,
    HighestRating,
    UniformRandom,
}

/// How a seed and its candidates are split into two teams
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivisionStrategy {
    NearestBalanced,
    Loose,
    Bucket,
    RandomSplit,
}

/// Whether the matcher grows its window when a seed finds too few candidates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowMode {
    Expanding,
    Fixed,
}

/// Team strength measure used when deciding a winner from true skill
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillAggregate {
    Average,
    Sum,
}

/// Simulation configuration parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Team size n; a game holds 2n players
    pub players_per_team: usize,
    /// First rating window the matcher tries
    pub initial_window: i32,
    /// Matcher rating bounds
    pub min_rating: i32,
    pub max_rating: i32,
    /// Observed rating of freshly generated players
    pub start_rating: i32,
    pub k_factor: f64,
    /// Loose divider: how many top-rated candidates are placed by alternation
    pub num_close: usize,
    /// Spread of generated true skills
    pub true_skill_std_dev: f64,
    /// Sample this many players into each round's pool
    pub online_cap: Option<usize>,
    /// Cap on game attempts per round
    pub games_per_round: Option<usize>,
    pub seed_strategy: SeedStrategy,
    pub division_strategy: DivisionStrategy,
    pub window_mode: WindowMode,
    pub skill_aggregate: SkillAggregate,
    pub histogram_bin_size: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            players_per_team: 12,
            initial_window: 400,
            min_rating: MIN_RATING,
            max_rating: MAX_RATING,
            start_rating: START_RATING,
            k_factor: K_FACTOR,
            num_close: 4,
            true_skill_std_dev: 300.0,
            online_cap: None,
            games_per_round: None,
            seed_strategy: SeedStrategy::FirstAvailable,
            division_strategy: DivisionStrategy::NearestBalanced,
            window_mode: WindowMode::Expanding,
            skill_aggregate: SkillAggregate::Average,
            histogram_bin_size: 25,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players_per_team == 0 {
            return Err(ConfigError::InvalidTeamSize(self.players_per_team));
        }
        if self.initial_window <= 0 {
            return Err(ConfigError::InvalidWindow(self.initial_window));
        }
        if self.initial_window > RATING_LIMIT {
            return Err(ConfigError::WindowTooLarge {
                window: self.initial_window,
                limit: RATING_LIMIT,
            });
        }
        for bound in [self.min_rating, self.max_rating] {
            if !(-RATING_LIMIT..=RATING_LIMIT).contains(&bound) {
                return Err(ConfigError::RatingBoundOutOfRange {
                    bound,
                    limit: RATING_LIMIT,
                });
            }
        }
        if self.min_rating >= self.max_rating {
            return Err(ConfigError::InvalidRatingBounds {
                min: self.min_rating,
                max: self.max_rating,
            });
        }
        if self.start_rating < self.min_rating || self.start_rating > self.max_rating {
            return Err(ConfigError::StartRatingOutOfBounds {
                rating: self.start_rating,
                min: self.min_rating,
                max: self.max_rating,
            });
        }
        if !(self.k_factor.is_finite() && self.k_factor > 0.0) {
            return Err(ConfigError::InvalidKFactor(self.k_factor));
        }
        if !(self.true_skill_std_dev.is_finite() && self.true_skill_std_dev > 0.0) {
            return Err(ConfigError::InvalidStdDev(self.true_skill_std_dev));
        }
        // population sampling redraws until a skill lands inside the bounds
        if self.true_skill_std_dev > self.rating_span() as f64 {
            return Err(ConfigError::StdDevTooLarge {
                std_dev: self.true_skill_std_dev,
                span: self.rating_span(),
            });
        }
        if self.histogram_bin_size <= 0 {
            return Err(ConfigError::InvalidBinSize(self.histogram_bin_size));
        }
        Ok(())
    }

    /// Players needed for one game
    pub fn players_per_game(&self) -> usize {
        2 * self.players_per_team
    }

    pub fn rating_span(&self) -> i32 {
        self.max_rating.saturating_sub(self.min_rating)
    }
}

/// Per-player report row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub rating: i32,
    pub games: usize,
    pub true_skill: i32,
    pub wins: usize,
    pub losses: usize,
    pub rating_error: i32,
}

impl From<&Player> for PlayerRecord {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id(),
            rating: player.rating(),
            games: player.game_count(),
            true_skill: player.true_skill(),
            wins: player.wins(),
            losses: player.losses(),
            rating_error: player.rating_error(),
        }
    }
}

/// Players whose current rating falls in `[bin_start, bin_start + bin_size)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub bin_start: i32,
    pub count: usize,
}

/// What one call to `Simulation::play_round` did
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u64,
    pub games: usize,
    pub attempts: usize,
    pub ignored_seeds: usize,
    pub unmatched: usize,
    pub team_a_wins: usize,
}

/// Running statistics for analysis
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    pub rounds_played: u64,
    pub total_games: usize,
    pub total_attempts: usize,
    /// Attempts that ended in `NoMatch`
    pub failed_attempts: usize,
    pub team_a_wins: usize,
    pub lowest_rating: i32,
    pub highest_rating: i32,
    pub avg_games_per_player: f64,
    /// Mean of |rating - true skill| over the roster
    pub mean_abs_rating_error: f64,
}
