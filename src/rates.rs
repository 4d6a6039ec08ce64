//! Conversion-rate domain types
//!
//! Validated value types for the simulator's ground truth: the true
//! conversion rate of an arm and the finite set of candidate relative
//! lifts the variation may carry.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A conversion probability, guaranteed to lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ConversionRate(f64);

impl ConversionRate {
    /// Create a validated conversion rate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProbability`] when `rate` is NaN or
    /// outside [0, 1].
    pub fn new(rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::InvalidProbability { value: rate });
        }
        Ok(Self(rate))
    }

    /// The raw probability.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Apply a relative lift, returning the lifted rate and the lift
    /// actually in force.
    ///
    /// When the lifted rate would exceed 100% the lift is forced to 0
    /// and the rate clamps to 1.0. That is a policy choice carried over
    /// from the scenario being modelled, not a numeric fixup: the
    /// ground-truth delta for such a trial really is "no effect".
    #[must_use]
    pub fn lifted(self, delta: f64) -> (Self, f64) {
        let raised = self.0 * (1.0 + delta);
        if raised > 1.0 {
            (Self(1.0), 0.0)
        } else {
            (Self(raised), delta)
        }
    }
}

/// A non-empty finite set of candidate relative lifts.
///
/// One element is drawn uniformly per trial to decide the unknown
/// ground truth the experimenter is trying to detect. Repeating a value
/// weights it, exactly like the original multiset
/// `[-0.1, -0.1, -0.05, 0, 0, 0, 0.05, 0.1, 0.1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftSet {
    lifts: Vec<f64>,
}

impl LiftSet {
    /// Create a validated lift set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the set is empty or any
    /// lift is non-finite or at or below -100% (which would drive a
    /// conversion rate negative).
    pub fn new(lifts: Vec<f64>) -> Result<Self> {
        if lifts.is_empty() {
            return Err(Error::InvalidConfig(
                "lift set must contain at least one candidate lift".to_string(),
            ));
        }
        if let Some(bad) = lifts.iter().find(|l| !l.is_finite() || **l <= -1.0) {
            return Err(Error::InvalidConfig(format!(
                "lift {bad} is not a usable relative change (must be finite and > -1.0)"
            )));
        }
        Ok(Self { lifts })
    }

    /// Draw one lift uniformly at random.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        self.lifts[rng.gen_range(0..self.lifts.len())]
    }

    /// Candidate lifts in this set.
    #[must_use]
    pub fn lifts(&self) -> &[f64] {
        &self.lifts
    }
}
