//! Seed selection: picking the anchor player for the next game attempt.

use crate::types::{Candidate, PlayerId, SeedStrategy};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::collections::HashSet;

/// Picks the anchor of the next game attempt from the current pool.
///
/// Players passed to `ignore` are skipped until the next `initialize`.
pub trait SeedSelector {
    /// Forget every exclusion. Called once at the start of each round.
    fn initialize(&mut self);

    /// A non-excluded player from `pool`, or `None` when the pool is empty or
    /// every remaining player is excluded.
    fn choose_seed(&mut self, pool: &[Candidate], rng: &mut dyn RngCore) -> Option<Candidate>;

    fn ignore(&mut self, player: PlayerId);
}

pub fn build_seed_selector(strategy: SeedStrategy) -> Box<dyn SeedSelector> {
    match strategy {
        SeedStrategy::FirstAvailable => Box::new(FirstAvailable::default()),
        SeedStrategy::HighestRating => Box::new(HighestRating::default()),
        SeedStrategy::UniformRandom => Box::new(UniformRandom::default()),
    }
}

/// First player in pool order that is not excluded
#[derive(Debug, Default)]
pub struct FirstAvailable {
    ignored: HashSet<PlayerId>,
}

impl SeedSelector for FirstAvailable {
    fn initialize(&mut self) {
        self.ignored.clear();
    }

    fn choose_seed(&mut self, pool: &[Candidate], _rng: &mut dyn RngCore) -> Option<Candidate> {
        pool.iter()
            .find(|c| !self.ignored.contains(&c.id))
            .copied()
    }

    fn ignore(&mut self, player: PlayerId) {
        self.ignored.insert(player);
    }
}

/// Highest current rating among non-excluded players; ties go to the first seen
#[derive(Debug, Default)]
pub struct HighestRating {
    ignored: HashSet<PlayerId>,
}

impl SeedSelector for HighestRating {
    fn initialize(&mut self) {
        self.ignored.clear();
    }

    fn choose_seed(&mut self, pool: &[Candidate], _rng: &mut dyn RngCore) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for candidate in pool.iter().filter(|c| !self.ignored.contains(&c.id)) {
            match best {
                Some(b) if candidate.rating <= b.rating => {}
                _ => best = Some(*candidate),
            }
        }
        best
    }

    fn ignore(&mut self, player: PlayerId) {
        self.ignored.insert(player);
    }
}

/// Uniformly random index. When it lands on an excluded player, falls back to
/// scanning a shuffled copy of the pool.
#[derive(Debug, Default)]
pub struct UniformRandom {
    ignored: HashSet<PlayerId>,
}

impl SeedSelector for UniformRandom {
    fn initialize(&mut self) {
        self.ignored.clear();
    }

    fn choose_seed(&mut self, pool: &[Candidate], rng: &mut dyn RngCore) -> Option<Candidate> {
        if pool.is_empty() {
            return None;
        }

        let pick = pool[rng.gen_range(0..pool.len())];
        if !self.ignored.contains(&pick.id) {
            return Some(pick);
        }

        // O(n) fallback
        let mut shuffled = pool.to_vec();
        shuffled.shuffle(rng);
        shuffled
            .into_iter()
            .find(|c| !self.ignored.contains(&c.id))
    }

    fn ignore(&mut self, player: PlayerId) {
        self.ignored.insert(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool(ratings: &[i32]) -> Vec<Candidate> {
        ratings
            .iter()
            .enumerate()
            .map(|(id, &rating)| Candidate { id, rating })
            .collect()
    }

    #[test]
    fn test_first_available_skips_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = pool(&[1000, 1200, 900]);
        let mut selector = FirstAvailable::default();

        assert_eq!(selector.choose_seed(&pool, &mut rng).map(|c| c.id), Some(0));
        selector.ignore(0);
        assert_eq!(selector.choose_seed(&pool, &mut rng).map(|c| c.id), Some(1));
        selector.ignore(1);
        selector.ignore(2);
        assert_eq!(selector.choose_seed(&pool, &mut rng), None);

        selector.initialize();
        assert_eq!(selector.choose_seed(&pool, &mut rng).map(|c| c.id), Some(0));
    }

    #[test]
    fn test_highest_rating_breaks_ties_by_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = pool(&[1000, 1500, 1500, 1200]);
        let mut selector = HighestRating::default();

        assert_eq!(selector.choose_seed(&pool, &mut rng).map(|c| c.id), Some(1));
        selector.ignore(1);
        assert_eq!(selector.choose_seed(&pool, &mut rng).map(|c| c.id), Some(2));
        selector.ignore(2);
        assert_eq!(selector.choose_seed(&pool, &mut rng).map(|c| c.id), Some(3));
    }

    #[test]
    fn test_empty_pool_yields_none() {
        let mut rng = StdRng::seed_from_u64(1);
        for strategy in [
            SeedStrategy::FirstAvailable,
            SeedStrategy::HighestRating,
            SeedStrategy::UniformRandom,
        ] {
            let mut selector = build_seed_selector(strategy);
            assert!(selector.choose_seed(&[], &mut rng).is_none());
        }
    }

    #[test]
    fn test_uniform_random_never_returns_ignored() {
        let mut rng = StdRng::seed_from_u64(99);
        let pool = pool(&[1000; 10]);
        let mut selector = UniformRandom::default();
        for id in 0..9 {
            selector.ignore(id);
        }

        for _ in 0..50 {
            assert_eq!(selector.choose_seed(&pool, &mut rng).map(|c| c.id), Some(9));
        }

        selector.ignore(9);
        assert!(selector.choose_seed(&pool, &mut rng).is_none());
    }

    #[test]
    fn test_uniform_random_is_reproducible() {
        let pool = pool(&[1000, 1100, 1200, 1300, 1400, 1500]);
        let draw = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut selector = UniformRandom::default();
            (0..20)
                .map(|_| selector.choose_seed(&pool, &mut rng).map(|c| c.id))
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(5), draw(5));
    }
}
