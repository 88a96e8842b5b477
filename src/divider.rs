//! Team division strategies.
//!
//! Every divider receives a seed plus at least `2n - 1` other candidates and
//! returns two teams of exactly `n` players. Which of the candidates are used
//! when more than `2n - 1` are offered is up to the strategy.

use crate::error::{ConfigError, SimError};
use crate::types::{Candidate, DivisionStrategy, Matchup, Team};
use rand::seq::SliceRandom;
use rand::RngCore;
use std::iter;

pub trait TeamDivider {
    fn divide(
        &mut self,
        candidates: &[Candidate],
        players_per_team: usize,
        seed: Candidate,
        rng: &mut dyn RngCore,
    ) -> Result<Matchup, SimError>;
}

pub fn build_divider(strategy: DivisionStrategy, num_close: usize) -> Box<dyn TeamDivider> {
    match strategy {
        DivisionStrategy::NearestBalanced => Box::new(NearestBalanced),
        DivisionStrategy::Loose => Box::new(Loose::new(num_close)),
        DivisionStrategy::Bucket => Box::new(Bucket),
        DivisionStrategy::RandomSplit => Box::new(RandomSplit),
    }
}

/// Returns how many candidates besides the seed the division will use.
fn check_candidates(
    candidates: &[Candidate],
    players_per_team: usize,
    seed: Candidate,
) -> Result<usize, SimError> {
    if players_per_team == 0 {
        return Err(ConfigError::InvalidTeamSize(players_per_team).into());
    }
    if candidates.iter().any(|c| c.id == seed.id) {
        return Err(SimError::SeedInCandidates(seed.id));
    }
    let needed = 2 * players_per_team - 1;
    if candidates.len() < needed {
        return Err(SimError::CandidateCount {
            expected: needed,
            actual: candidates.len(),
        });
    }
    Ok(needed)
}

/// Seed goes to team A, then the i-th following player (1-indexed) goes to A
/// when i is even and to B when i is odd.
fn alternate(seed: Candidate, rest: impl IntoIterator<Item = Candidate>) -> (Vec<Candidate>, Vec<Candidate>) {
    let mut team_a = vec![seed];
    let mut team_b = Vec::new();
    for (i, candidate) in rest.into_iter().enumerate() {
        if (i + 1) % 2 == 0 {
            team_a.push(candidate);
        } else {
            team_b.push(candidate);
        }
    }
    (team_a, team_b)
}

fn to_matchup(team_a: Vec<Candidate>, team_b: Vec<Candidate>) -> Matchup {
    Matchup::new(
        Team { players: team_a.into_iter().map(|c| c.id).collect() },
        Team { players: team_b.into_iter().map(|c| c.id).collect() },
    )
}

/// Candidates sorted by distance from the seed's rating, then alternated.
/// The two closest remaining players always land on opposite teams.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestBalanced;

impl TeamDivider for NearestBalanced {
    fn divide(
        &mut self,
        candidates: &[Candidate],
        players_per_team: usize,
        seed: Candidate,
        _rng: &mut dyn RngCore,
    ) -> Result<Matchup, SimError> {
        let needed = check_candidates(candidates, players_per_team, seed)?;

        // stable: equal distances keep pool order
        let mut sorted = candidates.to_vec();
        sorted.sort_by_key(|c| (c.rating - seed.rating).abs());

        let (team_a, team_b) = alternate(seed, sorted.into_iter().take(needed));
        Ok(to_matchup(team_a, team_b))
    }
}

/// The `num_close` highest-rated candidates are alternated like
/// `NearestBalanced`; the rest are shuffled and placed greedily on whichever
/// team keeps the two average ratings closest.
#[derive(Debug, Clone, Copy)]
pub struct Loose {
    num_close: usize,
}

impl Loose {
    pub fn new(num_close: usize) -> Self {
        Self { num_close }
    }

    /// Whether `candidate` should join A rather than B. Ties favor A. An empty
    /// B has no average to compare against, so it takes the player.
    fn joins_a(team_a: &[Candidate], team_b: &[Candidate], candidate: Candidate) -> bool {
        if team_b.is_empty() {
            return false;
        }
        let sum = |team: &[Candidate]| team.iter().map(|c| c.rating as f64).sum::<f64>();
        let (sum_a, sum_b) = (sum(team_a), sum(team_b));
        let avg_a = sum_a / team_a.len() as f64;
        let avg_b = sum_b / team_b.len() as f64;
        let rating = candidate.rating as f64;

        let diff_with_a = (sum_a + rating) / (team_a.len() + 1) as f64 - avg_b;
        let diff_with_b = (sum_b + rating) / (team_b.len() + 1) as f64 - avg_a;
        diff_with_a.abs() <= diff_with_b.abs()
    }
}

impl TeamDivider for Loose {
    fn divide(
        &mut self,
        candidates: &[Candidate],
        players_per_team: usize,
        seed: Candidate,
        rng: &mut dyn RngCore,
    ) -> Result<Matchup, SimError> {
        let needed = check_candidates(candidates, players_per_team, seed)?;

        let mut ranked = candidates.to_vec();
        ranked.sort_by(|a, b| b.rating.cmp(&a.rating));

        let close = self.num_close.min(needed);
        let (mut team_a, mut team_b) = alternate(seed, ranked[..close].iter().copied());

        let mut rest = ranked[close..].to_vec();
        rest.shuffle(rng);

        for candidate in rest.into_iter().take(needed - close) {
            let a_open = team_a.len() < players_per_team;
            let b_open = team_b.len() < players_per_team;
            match (a_open, b_open) {
                (true, true) => {
                    if Self::joins_a(&team_a, &team_b, candidate) {
                        team_a.push(candidate);
                    } else {
                        team_b.push(candidate);
                    }
                }
                (true, false) => team_a.push(candidate),
                (false, true) => team_b.push(candidate),
                (false, false) => break,
            }
        }

        Ok(to_matchup(team_a, team_b))
    }
}

/// Pure position parity in the order given. For pools that were already
/// filtered or sampled upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bucket;

impl TeamDivider for Bucket {
    fn divide(
        &mut self,
        candidates: &[Candidate],
        players_per_team: usize,
        seed: Candidate,
        _rng: &mut dyn RngCore,
    ) -> Result<Matchup, SimError> {
        let needed = check_candidates(candidates, players_per_team, seed)?;
        let (team_a, team_b) = alternate(seed, candidates.iter().copied().take(needed));
        Ok(to_matchup(team_a, team_b))
    }
}

/// Ignores ratings: a random `2n - 1` of the candidates plus the seed, shuffled
/// and split in half. The seed always plays, on either team.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSplit;

impl TeamDivider for RandomSplit {
    fn divide(
        &mut self,
        candidates: &[Candidate],
        players_per_team: usize,
        seed: Candidate,
        rng: &mut dyn RngCore,
    ) -> Result<Matchup, SimError> {
        let needed = check_candidates(candidates, players_per_team, seed)?;

        let mut pool = candidates.to_vec();
        let (drawn, _) = pool.partial_shuffle(rng, needed);
        let mut field: Vec<Candidate> = iter::once(seed).chain(drawn.iter().copied()).collect();
        field.shuffle(rng);

        let team_b = field.split_off(players_per_team);
        Ok(to_matchup(field, team_b))
    }
}
