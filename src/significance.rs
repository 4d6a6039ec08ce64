//! Significance evaluator
//!
//! Two-proportion z-test over Bernoulli conversion counts plus the
//! sequential stopping rule built on it. The rule is evaluated after
//! every new data point; that peeking inflates the false-positive rate
//! relative to a fixed-horizon z-test and is an intentional property of
//! the strategy being simulated, not a defect to correct.

#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};

use crate::dist;
use crate::trial::TrialState;
use crate::{Error, Result};

/// Default participant ceiling before a test is abandoned.
pub const DEFAULT_PARTICIPANT_CEILING: u64 = 10_000;

/// Default confidence threshold for declaring a winner.
pub const DEFAULT_CONFIDENCE: f64 = 0.99;

/// Verdict of one stopping-rule consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Not enough evidence yet, keep collecting data.
    Continue,
    /// Significance reached, stop and pick the observed winner.
    DeclareWinner,
    /// Participant ceiling hit without significance, give up on this test.
    Abandon,
}

/// Whether the normal approximation to the binomial is defensible for a
/// group of this size and conversion count.
///
/// Requires at least one conversion, at least 30 participants, and the
/// usual `np >= 5` / `n(1-p) >= 5` rule of thumb.
#[must_use]
pub fn gaussian_approximation_valid(participants: u64, conversions: u64) -> bool {
    if conversions == 0 || participants < 30 {
        return false;
    }
    let n = participants as f64;
    let rate = conversions as f64 / n;
    n * rate >= 5.0 && n * (1.0 - rate) >= 5.0
}

/// One-sided significance of the difference between two observed
/// conversion rates, in the direction actually observed.
///
/// Computes each group's rate and standard error `sqrt(p(1-p)/n)`,
/// forms the z-score of the rate difference, and returns
/// `max(cdf(z), 1 - cdf(z))`. The result is always in [0.5, 1.0] and is
/// symmetric under swapping the groups.
///
/// # Errors
///
/// Returns [`Error::ZeroParticipants`] when either group has no
/// participants, and [`Error::DegenerateStdErr`] when both standard
/// errors vanish (every or no participant converted in both groups),
/// which leaves the z-score undefined.
pub fn p_value(
    participants_a: u64,
    conversions_a: u64,
    participants_b: u64,
    conversions_b: u64,
) -> Result<f64> {
    if participants_a == 0 {
        return Err(Error::ZeroParticipants { arm: "control" });
    }
    if participants_b == 0 {
        return Err(Error::ZeroParticipants { arm: "variation" });
    }

    let n_a = participants_a as f64;
    let n_b = participants_b as f64;
    let rate_a = conversions_a as f64 / n_a;
    let rate_b = conversions_b as f64 / n_b;

    let var_a = rate_a * (1.0 - rate_a) / n_a;
    let var_b = rate_b * (1.0 - rate_b) / n_b;
    let pooled = var_a + var_b;
    if pooled <= 0.0 {
        return Err(Error::DegenerateStdErr { rate_a, rate_b });
    }

    let z = (rate_b - rate_a) / pooled.sqrt();
    let c = dist::cdf(z);
    Ok(c.max(1.0 - c))
}

/// Sequential stopping rule: declare a winner once the z-test clears a
/// confidence threshold, abandon once a participant ceiling is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceTest {
    participant_ceiling: u64,
    confidence: f64,
}

impl Default for SignificanceTest {
    fn default() -> Self {
        Self {
            participant_ceiling: DEFAULT_PARTICIPANT_CEILING,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl SignificanceTest {
    /// Create a stopping rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the ceiling is 0 or the
    /// confidence threshold is outside (0.5, 1.0).
    pub fn new(participant_ceiling: u64, confidence: f64) -> Result<Self> {
        if participant_ceiling == 0 {
            return Err(Error::InvalidConfig(
                "participant ceiling must be at least 1".to_string(),
            ));
        }
        if !(confidence > 0.5 && confidence < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "confidence threshold {confidence} must lie in (0.5, 1.0)"
            )));
        }
        Ok(Self {
            participant_ceiling,
            confidence,
        })
    }

    /// The participant ceiling after which a test is abandoned.
    #[must_use]
    pub const fn participant_ceiling(&self) -> u64 {
        self.participant_ceiling
    }

    /// The confidence threshold for declaring a winner.
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Consult the rule against the current trial state.
    ///
    /// The ceiling check comes first: abandonment fires exactly when the
    /// total participant count reaches the ceiling, never earlier. Below
    /// the ceiling the z-test only runs once both groups pass
    /// [`gaussian_approximation_valid`], so the p-value guards cannot
    /// trip during a normal simulation.
    ///
    /// # Errors
    ///
    /// Propagates [`p_value`] errors; unreachable when both groups pass
    /// the validity gate.
    pub fn evaluate(&self, state: &TrialState) -> Result<Decision> {
        if state.total_participants() >= self.participant_ceiling {
            return Ok(Decision::Abandon);
        }

        let valid = gaussian_approximation_valid(
            state.participants_control(),
            state.conversions_control(),
        ) && gaussian_approximation_valid(
            state.participants_variation(),
            state.conversions_variation(),
        );
        if !valid {
            return Ok(Decision::Continue);
        }

        let p = p_value(
            state.participants_control(),
            state.conversions_control(),
            state.participants_variation(),
            state.conversions_variation(),
        )?;
        if p >= self.confidence {
            Ok(Decision::DeclareWinner)
        } else {
            Ok(Decision::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::Arm;

    fn state(pc: u64, cc: u64, pv: u64, cv: u64) -> TrialState {
        TrialState::from_counts(pc, cc, pv, cv).unwrap()
    }

    #[test]
    fn validity_requires_conversions() {
        assert!(!gaussian_approximation_valid(1000, 0));
    }

    #[test]
    fn validity_requires_thirty_participants() {
        assert!(!gaussian_approximation_valid(29, 10));
        assert!(gaussian_approximation_valid(30, 10));
    }

    #[test]
    fn validity_requires_five_expected_in_each_cell() {
        // n*p = 4 < 5
        assert!(!gaussian_approximation_valid(100, 4));
        // n*(1-p) = 4 < 5
        assert!(!gaussian_approximation_valid(100, 96));
        assert!(gaussian_approximation_valid(100, 50));
    }

    #[test]
    fn p_value_in_upper_half() {
        let p = p_value(500, 50, 500, 80).unwrap();
        assert!((0.5..=1.0).contains(&p));
        // A 10% vs 16% split over 500 each is clearly significant.
        assert!(p > 0.99);
    }

    #[test]
    fn p_value_symmetric_under_group_swap() {
        let forward = p_value(400, 44, 360, 61).unwrap();
        let reversed = p_value(360, 61, 400, 44).unwrap();
        assert!((forward - reversed).abs() < 1e-12);
    }

    #[test]
    fn p_value_near_half_for_identical_rates() {
        let p = p_value(1000, 100, 1000, 100).unwrap();
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn p_value_guards_zero_participants() {
        assert!(matches!(
            p_value(0, 0, 100, 10),
            Err(Error::ZeroParticipants { arm: "control" })
        ));
        assert!(matches!(
            p_value(100, 10, 0, 0),
            Err(Error::ZeroParticipants { arm: "variation" })
        ));
    }

    #[test]
    fn p_value_guards_vanished_variance() {
        assert!(matches!(
            p_value(100, 0, 100, 100),
            Err(Error::DegenerateStdErr { .. })
        ));
    }

    #[test]
    fn one_degenerate_rate_is_still_computable() {
        // Control converted nobody but variation has variance, so the
        // z-score is finite.
        let p = p_value(100, 0, 100, 50).unwrap();
        assert!(p > 0.999);
    }

    #[test]
    fn rule_rejects_bad_thresholds() {
        assert!(SignificanceTest::new(0, 0.99).is_err());
        assert!(SignificanceTest::new(1000, 0.5).is_err());
        assert!(SignificanceTest::new(1000, 1.0).is_err());
        assert!(SignificanceTest::new(1000, 0.95).is_ok());
    }

    #[test]
    fn evaluate_abandons_at_ceiling_never_earlier() {
        let rule = SignificanceTest::new(200, 0.99).unwrap();

        // One participant below the ceiling with unremarkable counts.
        let below = state(100, 10, 99, 10);
        assert_eq!(below.total_participants(), 199);
        assert_eq!(rule.evaluate(&below).unwrap(), Decision::Continue);

        let at = state(100, 10, 100, 10);
        assert_eq!(rule.evaluate(&at).unwrap(), Decision::Abandon);

        let past = state(150, 10, 100, 10);
        assert_eq!(rule.evaluate(&past).unwrap(), Decision::Abandon);
    }

    #[test]
    fn ceiling_takes_priority_over_significance() {
        let rule = SignificanceTest::new(1000, 0.99).unwrap();
        // Wildly significant, but already at the ceiling.
        let s = state(500, 50, 500, 150);
        assert_eq!(rule.evaluate(&s).unwrap(), Decision::Abandon);
    }

    #[test]
    fn evaluate_continues_while_approximation_invalid() {
        let rule = SignificanceTest::default();
        // Huge imbalance but zero conversions on one side: the gate
        // keeps the z-test from firing.
        let s = state(100, 0, 100, 60);
        assert_eq!(rule.evaluate(&s).unwrap(), Decision::Continue);
    }

    #[test]
    fn evaluate_declares_winner_on_significance() {
        let rule = SignificanceTest::default();
        let s = state(500, 50, 500, 100);
        assert_eq!(rule.evaluate(&s).unwrap(), Decision::DeclareWinner);
    }

    #[test]
    fn evaluate_continues_on_weak_evidence() {
        let rule = SignificanceTest::default();
        let s = state(500, 50, 500, 55);
        assert_eq!(rule.evaluate(&s).unwrap(), Decision::Continue);
    }

    #[test]
    fn state_builder_used_by_tests_checks_invariant() {
        assert!(TrialState::from_counts(10, 11, 10, 0).is_err());
        let mut s = TrialState::new();
        s.record(Arm::Control, true);
        assert_eq!(s.participants_control(), 1);
        assert_eq!(s.conversions_control(), 1);
    }
}
