use crate::types::Candidate;

/// Filters a pool down to the players whose rating lies in a window.
pub trait CandidateFinder {
    /// Players with `center - window <= rating <= center`, in pool order.
    ///
    /// The window only extends downward from `center`. Callers wanting a
    /// symmetric range pass the upper bound as `center` and the full width as
    /// `window`.
    fn find(&self, pool: &[Candidate], center: i32, window: i32) -> Vec<Candidate>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowFinder;

impl CandidateFinder for WindowFinder {
    fn find(&self, pool: &[Candidate], center: i32, window: i32) -> Vec<Candidate> {
        let floor = center.saturating_sub(window);
        pool.iter()
            .filter(|c| c.rating <= center && c.rating >= floor)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_one_sided_and_inclusive() {
        let pool: Vec<Candidate> = [900, 1000, 1100, 1200, 1201]
            .iter()
            .enumerate()
            .map(|(id, &rating)| Candidate { id, rating })
            .collect();

        let found = WindowFinder.find(&pool, 1200, 200);
        let ids: Vec<_> = found.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_window_matches_exact_rating() {
        let pool = vec![
            Candidate { id: 4, rating: 1000 },
            Candidate { id: 5, rating: 1001 },
            Candidate { id: 6, rating: 1000 },
        ];
        let ids: Vec<_> = WindowFinder.find(&pool, 1000, 0).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 6]);
    }
}
