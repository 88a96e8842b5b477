use crate::error::{ConfigError, SimError};
use crate::matchmaker::{build_team_chooser, TeamChooser};
use crate::outcome::OutcomeEngine;
use crate::seed::{build_seed_selector, SeedSelector};
use crate::types::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Builds one round's worth of non-overlapping games from a pool snapshot.
#[derive(Clone, Copy, Debug)]
pub struct RoundOrchestrator {
    pub players_per_team: usize,
    /// Sample this many players into the pool instead of using everyone
    pub online_cap: Option<usize>,
    /// Stop after this many game attempts
    pub games_per_round: Option<usize>,
}

impl RoundOrchestrator {
    pub fn new(players_per_team: usize) -> Self {
        Self {
            players_per_team,
            online_cap: None,
            games_per_round: None,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            players_per_team: config.players_per_team,
            online_cap: config.online_cap,
            games_per_round: config.games_per_round,
        }
    }

    pub fn play(
        &self,
        players: &[Candidate],
        selector: &mut dyn SeedSelector,
        chooser: &mut dyn TeamChooser,
        rng: &mut dyn RngCore,
    ) -> Result<Round, SimError> {
        let pool = build_pool(players, self.online_cap, rng);
        drain_pool(pool, self.players_per_team, selector, chooser, self.games_per_round, rng)
    }
}

/// Plays seeds against a shrinking pool until fewer than `2n` players remain
/// or no seed is left to try.
pub fn play_round(
    players: &[Candidate],
    players_per_team: usize,
    selector: &mut dyn SeedSelector,
    chooser: &mut dyn TeamChooser,
    online_cap: Option<usize>,
    rng: &mut dyn RngCore,
) -> Result<Round, SimError> {
    let pool = build_pool(players, online_cap, rng);
    drain_pool(pool, players_per_team, selector, chooser, None, rng)
}

/// Like `play_round`, but stops after `num_games` attempts.
pub fn play_bounded_round(
    players: &[Candidate],
    players_per_team: usize,
    selector: &mut dyn SeedSelector,
    chooser: &mut dyn TeamChooser,
    online_cap: Option<usize>,
    num_games: usize,
    rng: &mut dyn RngCore,
) -> Result<Round, SimError> {
    let pool = build_pool(players, online_cap, rng);
    drain_pool(pool, players_per_team, selector, chooser, Some(num_games), rng)
}

fn build_pool(players: &[Candidate], online_cap: Option<usize>, rng: &mut dyn RngCore) -> Vec<Candidate> {
    match online_cap {
        Some(cap) if cap < players.len() => {
            let mut all = players.to_vec();
            let (sample, _) = all.partial_shuffle(rng, cap);
            sample.to_vec()
        }
        _ => players.to_vec(),
    }
}

fn drain_pool(
    mut pool: Vec<Candidate>,
    players_per_team: usize,
    selector: &mut dyn SeedSelector,
    chooser: &mut dyn TeamChooser,
    max_attempts: Option<usize>,
    rng: &mut dyn RngCore,
) -> Result<Round, SimError> {
    if players_per_team == 0 {
        return Err(ConfigError::InvalidTeamSize(players_per_team).into());
    }

    let per_game = 2 * players_per_team;
    let mut round = Round::default();
    selector.initialize();

    while pool.len() >= per_game {
        if matches!(max_attempts, Some(limit) if round.attempts >= limit) {
            break;
        }
        let Some(seed) = selector.choose_seed(&pool, rng) else {
            break;
        };
        round.attempts += 1;

        match chooser.choose_teams(&pool, seed, players_per_team, rng)? {
            Game::Matched(matchup) => {
                let taken: HashSet<PlayerId> = matchup.player_ids().collect();
                let before = pool.len();
                pool.retain(|c| !taken.contains(&c.id));
                debug_assert_eq!(before - pool.len(), per_game, "game used players outside the pool");
                round.games.push(matchup);
            }
            Game::NoMatch => {
                // stays in the pool, just never seeds again this round
                selector.ignore(seed.id);
                round.ignored_seeds += 1;
            }
        }
    }

    round.unmatched = pool.len();
    Ok(round)
}

/// Main simulation state and controller
pub struct Simulation {
    roster: Roster,
    config: SimulationConfig,
    rng: StdRng,
    orchestrator: RoundOrchestrator,
    seed_selector: Box<dyn SeedSelector>,
    chooser: Box<dyn TeamChooser>,
    outcome: OutcomeEngine,
    stats: SimulationStats,
}

impl Simulation {
    pub fn new(config: SimulationConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_players(config, Vec::new(), seed)
    }

    /// Start from an externally built population
    pub fn with_players(config: SimulationConfig, players: Vec<Player>, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let roster = Roster::new(players)?;
        log::info!(
            "simulation: {} players, {} per team, {:?} seeds, {:?} division, {:?} window from {}",
            roster.len(),
            config.players_per_team,
            config.seed_strategy,
            config.division_strategy,
            config.window_mode,
            config.initial_window
        );

        let mut sim = Self {
            roster,
            orchestrator: RoundOrchestrator::from_config(&config),
            seed_selector: build_seed_selector(config.seed_strategy),
            chooser: build_team_chooser(&config),
            outcome: OutcomeEngine::new(config.k_factor, config.skill_aggregate),
            config,
            rng: StdRng::seed_from_u64(seed),
            stats: SimulationStats::default(),
        };
        sim.update_stats();
        Ok(sim)
    }

    /// Generate `count` players with normally distributed true skills.
    ///
    /// Skills center on the midpoint `min_rating + (max_rating - min_rating) / 2`,
    /// not on `(max_rating - min_rating) / 2`; the two agree only when
    /// `min_rating` is zero. Draws outside the bounds are redrawn, which stays
    /// cheap because `validate` caps the deviation at the rating span.
    pub fn generate_population(&mut self, count: usize) -> Result<(), ConfigError> {
        let span = self.config.rating_span();
        let center = (self.config.min_rating + span / 2) as f64;
        let normal = Normal::new(center, self.config.true_skill_std_dev)
            .map_err(|_| ConfigError::InvalidStdDev(self.config.true_skill_std_dev))?;
        let (low, high) = (self.config.min_rating as f64, self.config.max_rating as f64);

        let first_id = self.roster.next_id();
        for id in first_id..first_id + count {
            let mut skill = normal.sample(&mut self.rng);
            while !(low..=high).contains(&skill) {
                skill = normal.sample(&mut self.rng);
            }
            let player = Player::with_rating(id, skill.round() as i32, self.config.start_rating);
            self.roster.push(player)?;
        }

        log::info!("generated {} players (ids {}..{})", count, first_id, first_id + count);
        self.update_stats();
        Ok(())
    }

    /// Match one round, then play its games in creation order.
    pub fn play_round(&mut self) -> Result<RoundSummary, SimError> {
        let snapshot = self.roster.snapshot();
        let round = self.orchestrator.play(
            &snapshot,
            self.seed_selector.as_mut(),
            self.chooser.as_mut(),
            &mut self.rng,
        )?;

        let mut team_a_wins = 0;
        for matchup in &round.games {
            if self.outcome.play(&mut self.roster, matchup, &mut self.rng)?.team_a_won {
                team_a_wins += 1;
            }
        }

        self.stats.rounds_played += 1;
        self.stats.total_games += round.games.len();
        self.stats.total_attempts += round.attempts;
        self.stats.failed_attempts += round.ignored_seeds;
        self.stats.team_a_wins += team_a_wins;
        self.update_stats();

        let summary = RoundSummary {
            round: self.stats.rounds_played,
            games: round.games.len(),
            attempts: round.attempts,
            ignored_seeds: round.ignored_seeds,
            unmatched: round.unmatched,
            team_a_wins,
        };
        log::debug!(
            "round {}: {} games from {} attempts, {} seeds ignored, {} left in pool",
            summary.round,
            summary.games,
            summary.attempts,
            summary.ignored_seeds,
            summary.unmatched
        );
        Ok(summary)
    }

    /// Play `rounds` rounds back to back
    pub fn run(&mut self, rounds: u64) -> Result<Vec<RoundSummary>, SimError> {
        (0..rounds).map(|_| self.play_round()).collect()
    }

    fn update_stats(&mut self) {
        let count = self.roster.len();
        if count == 0 {
            return;
        }

        let mut lowest = i32::MAX;
        let mut highest = i32::MIN;
        let mut games = 0usize;
        let mut abs_error = 0i64;
        for player in self.roster.iter() {
            lowest = lowest.min(player.rating());
            highest = highest.max(player.rating());
            games += player.game_count();
            abs_error += player.rating_error().abs() as i64;
        }

        self.stats.lowest_rating = lowest;
        self.stats.highest_rating = highest;
        self.stats.avg_games_per_player = games as f64 / count as f64;
        self.stats.mean_abs_rating_error = abs_error as f64 / count as f64;
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Per-game observed rating differences, in play order
    pub fn rating_diffs(&self) -> &[f64] {
        self.outcome.rating_diffs()
    }

    pub fn player_records(&self) -> Vec<PlayerRecord> {
        self.roster.iter().map(PlayerRecord::from).collect()
    }

    /// Players grouped by current rating. Bins start at
    /// `min_rating + k * bin_size` and are returned in ascending order.
    pub fn rating_histogram(&self, bin_size: i32) -> Result<Vec<HistogramBin>, ConfigError> {
        if bin_size <= 0 {
            return Err(ConfigError::InvalidBinSize(bin_size));
        }
        let min = self.config.min_rating;
        let mut bins: BTreeMap<i32, usize> = BTreeMap::new();
        for player in self.roster.iter() {
            let start = min + (player.rating() - min).div_euclid(bin_size) * bin_size;
            *bins.entry(start).or_insert(0) += 1;
        }
        Ok(bins
            .into_iter()
            .map(|(bin_start, count)| HistogramBin { bin_start, count })
            .collect())
    }

    /// Replace the configuration, keeping the population and its ratings
    pub fn update_config(&mut self, config: SimulationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.orchestrator = RoundOrchestrator::from_config(&config);
        self.seed_selector = build_seed_selector(config.seed_strategy);
        self.chooser = build_team_chooser(&config);
        self.outcome.reconfigure(config.k_factor, config.skill_aggregate);
        self.config = config;
        Ok(())
    }

    /// Clear statistics and rating differences, keep the population
    pub fn reset_stats(&mut self) {
        self.stats = SimulationStats::default();
        self.outcome.clear_rating_diffs();
        self.update_stats();
    }

    pub fn get_state_json(&self) -> String {
        serde_json::to_string(&SimulationState {
            rounds_played: self.stats.rounds_played,
            total_players: self.roster.len(),
            stats: self.stats.clone(),
            config: self.config.clone(),
        })
        .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize)]
pub struct SimulationState {
    pub rounds_played: u64,
    pub total_players: usize,
    pub stats: SimulationStats,
    pub config: SimulationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::divider::Bucket;
    use crate::finder::WindowFinder;
    use crate::matchmaker::FixedWindowMatcher;
    use crate::seed::{FirstAvailable, HighestRating};

    fn create_test_simulation(config: SimulationConfig) -> Simulation {
        let mut sim = Simulation::new(config, 42).unwrap();
        sim.generate_population(200).unwrap();
        sim
    }

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            players_per_team: 3,
            ..SimulationConfig::default()
        }
    }

    fn candidates(ratings: &[i32]) -> Vec<Candidate> {
        ratings
            .iter()
            .enumerate()
            .map(|(id, &rating)| Candidate { id, rating })
            .collect()
    }

    fn assert_disjoint(round: &Round) {
        let mut seen = HashSet::new();
        for id in round.player_ids() {
            assert!(seen.insert(id), "player {} appears twice in one round", id);
        }
    }

    #[test]
    fn test_round_drains_pool_without_duplicates() {
        let mut sim = create_test_simulation(small_config());
        let snapshot = sim.roster.snapshot();
        let mut selector = HighestRating::default();
        let mut chooser = build_team_chooser(sim.config());

        let round = play_round(&snapshot, 3, &mut selector, chooser.as_mut(), None, &mut sim.rng).unwrap();
        assert_disjoint(&round);
        // the expanding window always reaches the whole pool
        assert_eq!(round.games.len(), 200 / 6);
        assert_eq!(round.unmatched, 200 % 6);
        for game in &round.games {
            assert_eq!(game.team_a.len(), 3);
            assert_eq!(game.team_b.len(), 3);
        }
    }

    #[test]
    fn test_no_match_seed_is_ignored_not_removed() {
        let mut rng = StdRng::seed_from_u64(0);
        let players = candidates(&[1000, 1000, 1000, 1000, 2500]);
        let mut selector = HighestRating::default();
        let mut chooser = FixedWindowMatcher::new(Box::new(Bucket), Box::new(WindowFinder), 100);

        let round = play_round(&players, 2, &mut selector, &mut chooser, None, &mut rng).unwrap();
        assert_eq!(round.games.len(), 1);
        assert_eq!(round.attempts, 2);
        assert_eq!(round.ignored_seeds, 1);
        assert_eq!(round.unmatched, 1);
        assert!(!round.player_ids().any(|id| id == 4));
    }

    #[test]
    fn test_too_few_players_makes_empty_round() {
        let mut rng = StdRng::seed_from_u64(0);
        let players = candidates(&[1000, 1000, 1000]);
        let mut selector = FirstAvailable::default();
        let mut chooser = build_team_chooser(&SimulationConfig::default());

        let round = play_round(&players, 2, &mut selector, chooser.as_mut(), None, &mut rng).unwrap();
        assert!(round.games.is_empty());
        assert_eq!(round.unmatched, 3);
    }

    #[test]
    fn test_bounded_round_caps_attempts() {
        let mut sim = create_test_simulation(small_config());
        let snapshot = sim.roster.snapshot();
        let mut selector = FirstAvailable::default();
        let mut chooser = build_team_chooser(sim.config());

        let round =
            play_bounded_round(&snapshot, 3, &mut selector, chooser.as_mut(), None, 5, &mut sim.rng).unwrap();
        assert_eq!(round.attempts, 5);
        assert_eq!(round.games.len(), 5);
        assert_eq!(round.unmatched, 200 - 30);
    }

    #[test]
    fn test_online_cap_samples_pool() {
        let mut sim = create_test_simulation(small_config());
        let snapshot = sim.roster.snapshot();
        let mut selector = FirstAvailable::default();
        let mut chooser = build_team_chooser(sim.config());

        let round = play_round(&snapshot, 3, &mut selector, chooser.as_mut(), Some(40), &mut sim.rng).unwrap();
        assert_disjoint(&round);
        assert_eq!(round.games.len(), 6);
        assert_eq!(round.unmatched, 4);
    }

    #[test]
    fn test_zero_team_size_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut selector = FirstAvailable::default();
        let mut chooser = build_team_chooser(&SimulationConfig::default());

        let err = play_round(&candidates(&[1000; 4]), 0, &mut selector, chooser.as_mut(), None, &mut rng)
            .unwrap_err();
        assert_eq!(err, SimError::Config(ConfigError::InvalidTeamSize(0)));
    }

    #[test]
    fn test_population_skills_within_bounds() {
        let sim = create_test_simulation(SimulationConfig::default());
        assert_eq!(sim.roster().len(), 200);
        for player in sim.roster().iter() {
            assert!((0..=2800).contains(&player.true_skill()));
            assert_eq!(player.rating(), START_RATING);
        }
        let ids: HashSet<_> = sim.roster().iter().map(|p| p.id()).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_population_centers_on_bound_midpoint() {
        let config = SimulationConfig {
            min_rating: 1000,
            max_rating: 2000,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config, 5).unwrap();
        sim.generate_population(400).unwrap();

        let skills: Vec<i32> = sim.roster().iter().map(|p| p.true_skill()).collect();
        assert!(skills.iter().all(|s| (1000..=2000).contains(s)));
        let mean = skills.iter().map(|&s| s as f64).sum::<f64>() / skills.len() as f64;
        assert!((mean - 1500.0).abs() < 60.0, "mean skill {}", mean);
    }

    #[test]
    fn test_play_round_updates_every_matched_player_once() {
        let mut sim = create_test_simulation(small_config());
        let summary = sim.play_round().unwrap();

        assert_eq!(summary.games, 33);
        let played = sim.roster().iter().filter(|p| p.game_count() == 1).count();
        assert_eq!(played, 33 * 6);
        assert!(sim.roster().iter().all(|p| p.game_count() <= 1));
        assert_eq!(sim.rating_diffs().len(), 33);
        assert_eq!(sim.stats().total_games, 33);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let run = || {
            let config = SimulationConfig {
                seed_strategy: SeedStrategy::UniformRandom,
                division_strategy: DivisionStrategy::Loose,
                online_cap: Some(120),
                ..small_config()
            };
            let mut sim = create_test_simulation(config);
            sim.run(10).unwrap();
            (sim.player_records(), sim.rating_diffs().to_vec())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_history_invariants_after_many_rounds() {
        let mut sim = create_test_simulation(SimulationConfig {
            k_factor: 400.0,
            ..small_config()
        });
        sim.run(30).unwrap();

        for player in sim.roster().iter() {
            assert_eq!(player.game_count(), player.history().len() - 1);
            assert_eq!(player.game_count(), player.wins() + player.losses());
            assert!(player
                .history()
                .as_slice()
                .iter()
                .all(|r| (MIN_RATING..=MAX_RATING).contains(r)));
        }
    }

    #[test]
    fn test_histogram_counts_every_player() {
        let mut sim = create_test_simulation(small_config());
        sim.run(5).unwrap();

        let bins = sim.rating_histogram(25).unwrap();
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 200);
        assert!(bins.windows(2).all(|w| w[0].bin_start < w[1].bin_start));
        assert!(bins.iter().all(|b| b.bin_start % 25 == 0));
        assert!(sim.rating_histogram(0).is_err());
    }

    #[test]
    fn test_histogram_offsets_from_min_rating() {
        let config = SimulationConfig {
            min_rating: 10,
            ..SimulationConfig::default()
        };
        let players = vec![
            Player::with_rating(0, 1000, 10),
            Player::with_rating(1, 1000, 34),
            Player::with_rating(2, 1000, 35),
        ];
        let sim = Simulation::with_players(config, players, 1).unwrap();

        let bins = sim.rating_histogram(25).unwrap();
        assert_eq!(
            bins,
            vec![
                HistogramBin { bin_start: 10, count: 2 },
                HistogramBin { bin_start: 35, count: 1 },
            ]
        );
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = SimulationConfig {
            min_rating: 3000,
            ..SimulationConfig::default()
        };
        assert!(Simulation::new(config, 1).is_err());

        let dupes = vec![Player::new(3, 1000), Player::new(3, 1100)];
        assert_eq!(
            Simulation::with_players(SimulationConfig::default(), dupes, 1).err(),
            Some(ConfigError::DuplicatePlayer(3))
        );
    }

    #[test]
    fn test_update_config_keeps_population() {
        let mut sim = create_test_simulation(small_config());
        sim.run(2).unwrap();
        let before = sim.player_records();

        sim.update_config(SimulationConfig {
            players_per_team: 5,
            ..small_config()
        })
        .unwrap();
        assert_eq!(sim.player_records(), before);

        let summary = sim.play_round().unwrap();
        assert_eq!(summary.games, 20);

        let mut bad = small_config();
        bad.initial_window = -1;
        assert!(sim.update_config(bad).is_err());
        assert_eq!(sim.config().players_per_team, 5);
    }

    #[test]
    fn test_reset_stats_keeps_ratings() {
        let mut sim = create_test_simulation(small_config());
        sim.run(3).unwrap();
        let before = sim.player_records();

        sim.reset_stats();
        assert_eq!(sim.stats().rounds_played, 0);
        assert!(sim.rating_diffs().is_empty());
        assert_eq!(sim.player_records(), before);
    }

    #[test]
    fn test_state_json_contains_stats() {
        let mut sim = create_test_simulation(small_config());
        sim.play_round().unwrap();
        let state: serde_json::Value = serde_json::from_str(&sim.get_state_json()).unwrap();
        assert_eq!(state["rounds_played"], 1);
        assert_eq!(state["total_players"], 200);
        assert_eq!(state["config"]["players_per_team"], 3);
    }
}
