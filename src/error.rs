//! Error types for splitsim
//!
//! Every failure mode in the simulator is a numeric degeneracy or a bad
//! configuration value; each gets a structured variant instead of a NaN
//! propagating through the decision path.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Splitsim error types
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration value rejected before a simulation starts
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A probability argument outside [0, 1]
    #[error("invalid probability {value}: must be within [0, 1]")]
    InvalidProbability {
        /// The offending value
        value: f64,
    },

    /// Standard deviation must be strictly positive for cdf/pdf/inverse-cdf
    #[error("degenerate standard deviation {std}: must be > 0")]
    DegenerateStdDev {
        /// The offending value
        std: f64,
    },

    /// An observed rate was requested for an arm that nobody visited
    #[error("cannot compute an observed rate for the {arm} arm: 0 participants")]
    ZeroParticipants {
        /// Which arm had zero participants
        arm: &'static str,
    },

    /// Both groups' standard errors vanished, so the z-score is undefined
    #[error(
        "degenerate standard error: both observed rates ({rate_a} vs {rate_b}) \
         have zero variance, z-score is undefined"
    )]
    DegenerateStdErr {
        /// Observed rate of the first group
        rate_a: f64,
        /// Observed rate of the second group
        rate_b: f64,
    },

    /// Every independent simulation run failed; nothing to aggregate
    #[error("all {failed} simulation runs failed; nothing to aggregate")]
    AllRunsFailed {
        /// Number of runs that failed
        failed: u32,
    },
}
