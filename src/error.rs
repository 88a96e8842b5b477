use crate::types::PlayerId;
use thiserror::Error;

/// Fatal construction-time problems. A simulation cannot start with any of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("players per team must be positive, got {0}")]
    InvalidTeamSize(usize),

    #[error("initial window must be positive, got {0}")]
    InvalidWindow(i32),

    #[error("initial window {window} exceeds {limit}")]
    WindowTooLarge { window: i32, limit: i32 },

    #[error("rating bound {bound} lies outside [-{limit}, {limit}]")]
    RatingBoundOutOfRange { bound: i32, limit: i32 },

    #[error("rating bounds are inverted: min {min} >= max {max}")]
    InvalidRatingBounds { min: i32, max: i32 },

    #[error("start rating {rating} lies outside [{min}, {max}]")]
    StartRatingOutOfBounds { rating: i32, min: i32, max: i32 },

    #[error("true skill standard deviation must be positive, got {0}")]
    InvalidStdDev(f64),

    #[error("true skill standard deviation {std_dev} is wider than the rating span {span}")]
    StdDevTooLarge { std_dev: f64, span: i32 },

    #[error("histogram bin size must be positive, got {0}")]
    InvalidBinSize(i32),

    #[error("k-factor must be finite and positive, got {0}")]
    InvalidKFactor(f64),

    #[error("duplicate player id {0}")]
    DuplicatePlayer(PlayerId),

    #[error("unknown sweep parameter: {0}")]
    UnknownParameter(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A divider was handed a candidate set it cannot split. This is a caller
    /// bug, not an infeasible field (that is `Game::NoMatch`).
    #[error("divider needs at least {expected} candidates besides the seed, got {actual}")]
    CandidateCount { expected: usize, actual: usize },

    #[error("seed {0} was passed inside its own candidate list")]
    SeedInCandidates(PlayerId),

    #[error("unknown player id {0}")]
    UnknownPlayer(PlayerId),
}

impl SimError {
    /// True for errors caused by internal misuse rather than bad input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SimError::CandidateCount { .. } | SimError::SeedInCandidates(_)
        )
    }
}
