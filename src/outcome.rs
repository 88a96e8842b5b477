use crate::error::SimError;
use crate::types::{Matchup, Roster, SkillAggregate, Team};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Logistic win expectancy for a rating advantage of `diff`
pub fn expected_score(diff: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(-diff / 400.0))
}

/// Result of one played game
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub team_a_won: bool,
    /// Observed average-rating difference (A - B) before the update
    pub rating_diff: f64,
}

/// Decides winners from true skill and moves observed ratings toward them.
#[derive(Clone, Debug)]
pub struct OutcomeEngine {
    k_factor: f64,
    aggregate: SkillAggregate,
    rating_diffs: Vec<f64>,
}

impl OutcomeEngine {
    pub fn new(k_factor: f64, aggregate: SkillAggregate) -> Self {
        Self {
            k_factor,
            aggregate,
            rating_diffs: Vec::new(),
        }
    }

    fn skill_diff(&self, roster: &Roster, matchup: &Matchup) -> Result<f64, SimError> {
        Ok(match self.aggregate {
            SkillAggregate::Average => {
                matchup.team_a.average_true_skill(roster)? - matchup.team_b.average_true_skill(roster)?
            }
            SkillAggregate::Sum => {
                matchup.team_a.true_skill_sum(roster)? - matchup.team_b.true_skill_sum(roster)?
            }
        })
    }

    /// `true` when team A wins. Consumes exactly one uniform draw.
    pub fn decide_winner(
        &self,
        roster: &Roster,
        matchup: &Matchup,
        rng: &mut dyn RngCore,
    ) -> Result<bool, SimError> {
        let expected = expected_score(self.skill_diff(roster, matchup)?);
        let draw: f64 = rng.gen();
        Ok(draw < expected)
    }

    /// Moves every participant's observed rating by `K * (score - expected)`,
    /// where the expectation comes from current observed team averages.
    /// Returns the recorded rating difference.
    pub fn update_ratings(
        &mut self,
        roster: &mut Roster,
        matchup: &Matchup,
        team_a_won: bool,
    ) -> Result<f64, SimError> {
        // resolves every id before anything is mutated
        let diff = matchup.team_a.average_rating(roster)? - matchup.team_b.average_rating(roster)?;
        let expected_a = expected_score(diff);
        let score_a = if team_a_won { 1.0 } else { 0.0 };

        self.apply(roster, &matchup.team_a, score_a - expected_a, team_a_won)?;
        self.apply(roster, &matchup.team_b, (1.0 - score_a) - (1.0 - expected_a), !team_a_won)?;

        self.rating_diffs.push(diff);
        Ok(diff)
    }

    fn apply(&self, roster: &mut Roster, team: &Team, delta: f64, won: bool) -> Result<(), SimError> {
        for &id in &team.players {
            let player = roster.get_mut(id).ok_or(SimError::UnknownPlayer(id))?;
            let new_rating = (player.rating() as f64 + self.k_factor * delta).round() as i32;
            player.record_game(new_rating, won);
        }
        Ok(())
    }

    /// Decide, then update
    pub fn play(
        &mut self,
        roster: &mut Roster,
        matchup: &Matchup,
        rng: &mut dyn RngCore,
    ) -> Result<GameOutcome, SimError> {
        let team_a_won = self.decide_winner(roster, matchup, rng)?;
        let rating_diff = self.update_ratings(roster, matchup, team_a_won)?;
        Ok(GameOutcome {
            team_a_won,
            rating_diff,
        })
    }

    /// Swap parameters without losing the recorded differences
    pub fn reconfigure(&mut self, k_factor: f64, aggregate: SkillAggregate) {
        self.k_factor = k_factor;
        self.aggregate = aggregate;
    }

    /// Rating differences of every game played, in play order
    pub fn rating_diffs(&self) -> &[f64] {
        &self.rating_diffs
    }

    pub fn clear_rating_diffs(&mut self) {
        self.rating_diffs.clear();
    }
}
