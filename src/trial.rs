//! Sequential trial engine
//!
//! Simulates a single A/B test: visitors arrive one at a time (or in
//! daily batches), each is assigned to an arm by a fair independent
//! coin, converts according to that arm's true rate, and a stopping
//! policy is consulted after each increment.
//!
//! Per trial the engine is a small state machine: `RUNNING` until the
//! policy stops it, then either a decision with an observed winner or
//! an abandonment with no outcome.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rates::ConversionRate;
use crate::significance::{Decision, SignificanceTest};
use crate::{Error, Result};

/// The two arms of an A/B test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arm {
    /// The incumbent experience.
    Control,
    /// The challenger experience.
    Variation,
}

/// Running participant/conversion counts for one trial.
///
/// Invariant: per arm, conversions never exceed participants. The only
/// mutator is [`TrialState::record`], which upholds it by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialState {
    participants_control: u64,
    conversions_control: u64,
    participants_variation: u64,
    conversions_variation: u64,
}

impl TrialState {
    /// Fresh all-zero state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from raw counts, validating the invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when either arm has more
    /// conversions than participants.
    pub fn from_counts(
        participants_control: u64,
        conversions_control: u64,
        participants_variation: u64,
        conversions_variation: u64,
    ) -> Result<Self> {
        if conversions_control > participants_control
            || conversions_variation > participants_variation
        {
            return Err(Error::InvalidConfig(
                "conversions cannot exceed participants".to_string(),
            ));
        }
        Ok(Self {
            participants_control,
            conversions_control,
            participants_variation,
            conversions_variation,
        })
    }

    /// Record one visitor on the given arm.
    pub fn record(&mut self, arm: Arm, converted: bool) {
        match arm {
            Arm::Control => {
                self.participants_control += 1;
                if converted {
                    self.conversions_control += 1;
                }
            }
            Arm::Variation => {
                self.participants_variation += 1;
                if converted {
                    self.conversions_variation += 1;
                }
            }
        }
    }

    /// Participants on the control arm.
    #[must_use]
    pub const fn participants_control(&self) -> u64 {
        self.participants_control
    }

    /// Conversions on the control arm.
    #[must_use]
    pub const fn conversions_control(&self) -> u64 {
        self.conversions_control
    }

    /// Participants on the variation arm.
    #[must_use]
    pub const fn participants_variation(&self) -> u64 {
        self.participants_variation
    }

    /// Conversions on the variation arm.
    #[must_use]
    pub const fn conversions_variation(&self) -> u64 {
        self.conversions_variation
    }

    /// Participants across both arms.
    #[must_use]
    pub const fn total_participants(&self) -> u64 {
        self.participants_control + self.participants_variation
    }

    /// Observed conversion rate of an arm, `None` while the arm has no
    /// participants. 0/0 is never treated as a comparable rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn observed_rate(&self, arm: Arm) -> Option<f64> {
        let (participants, conversions) = match arm {
            Arm::Control => (self.participants_control, self.conversions_control),
            Arm::Variation => (self.participants_variation, self.conversions_variation),
        };
        if participants == 0 {
            None
        } else {
            Some(conversions as f64 / participants as f64)
        }
    }
}

/// True conversion rates of the two arms plus the ground-truth lift
/// actually in force (post clamping).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialArms {
    control: ConversionRate,
    variation: ConversionRate,
    true_lift: f64,
}

impl TrialArms {
    /// Set up a trial: the variation's true rate is the control rate
    /// with `delta` applied under the clamp policy of
    /// [`ConversionRate::lifted`].
    #[must_use]
    pub fn from_lift(control: ConversionRate, delta: f64) -> Self {
        let (variation, true_lift) = control.lifted(delta);
        Self {
            control,
            variation,
            true_lift,
        }
    }

    /// True rate of the control arm.
    #[must_use]
    pub const fn control(&self) -> ConversionRate {
        self.control
    }

    /// True rate of the variation arm.
    #[must_use]
    pub const fn variation(&self) -> ConversionRate {
        self.variation
    }

    /// The ground-truth relative lift in force for this trial.
    #[must_use]
    pub const fn true_lift(&self) -> f64 {
        self.true_lift
    }

    /// Simulate one visitor: a fair coin picks the arm, then a
    /// Bernoulli draw at the arm's true rate decides conversion.
    pub fn step<R: Rng>(&self, state: &mut TrialState, rng: &mut R) {
        let arm = if rng.gen_bool(0.5) {
            Arm::Control
        } else {
            Arm::Variation
        };
        let rate = match arm {
            Arm::Control => self.control,
            Arm::Variation => self.variation,
        };
        let converted = rng.gen_bool(rate.value());
        state.record(arm, converted);
    }
}

/// The observed winner of a decided trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialOutcome {
    /// Control's observed rate was strictly higher.
    Control,
    /// Variation's observed rate was strictly higher.
    Variation,
    /// Exactly equal observed rates.
    Tie,
}

/// How a trial stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStop {
    /// Stopped by the policy with an observed winner.
    Decided(TrialOutcome),
    /// Stopped without a usable outcome (ceiling hit, or an arm nobody
    /// visited made the comparison meaningless).
    Abandoned,
}

/// Result of a visitor-by-visitor sequential trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialTrial {
    /// Final counts at stop time.
    pub state: TrialState,
    /// How the trial stopped.
    pub stop: TrialStop,
}

/// Result of a day-batched trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchedTrial {
    /// Final counts at stop time.
    pub state: TrialState,
    /// How the trial stopped.
    pub stop: TrialStop,
    /// Simulated days this trial consumed.
    pub days: u32,
}

/// Compare observed rates at stop time. `None` when either arm has no
/// participants: a 0/0 rate never decides a test.
#[must_use]
pub fn observed_winner(state: &TrialState) -> Option<TrialOutcome> {
    let control = state.observed_rate(Arm::Control)?;
    let variation = state.observed_rate(Arm::Variation)?;
    // Tie only on exact equality; the rates are finite by construction.
    let outcome = if control == variation {
        TrialOutcome::Tie
    } else if control > variation {
        TrialOutcome::Control
    } else {
        TrialOutcome::Variation
    };
    Some(outcome)
}

/// Run one trial visitor-by-visitor under the statistical stopping
/// rule, consulting it after every single visitor.
///
/// Terminates because the participant count grows monotonically toward
/// the rule's ceiling.
///
/// # Errors
///
/// Propagates evaluator errors; the trial is aborted rather than
/// continued with corrupt state.
pub fn run_sequential<R: Rng>(
    arms: &TrialArms,
    rule: &SignificanceTest,
    rng: &mut R,
) -> Result<SequentialTrial> {
    let mut state = TrialState::new();
    loop {
        arms.step(&mut state, rng);
        match rule.evaluate(&state)? {
            Decision::Continue => {}
            Decision::DeclareWinner => {
                let stop = match observed_winner(&state) {
                    Some(outcome) => TrialStop::Decided(outcome),
                    None => {
                        debug!(
                            participants = state.total_participants(),
                            "winner declared with an unvisited arm, treating as abandoned"
                        );
                        TrialStop::Abandoned
                    }
                };
                return Ok(SequentialTrial { state, stop });
            }
            Decision::Abandon => {
                return Ok(SequentialTrial {
                    state,
                    stop: TrialStop::Abandoned,
                });
            }
        }
    }
}

/// Run one trial in daily batches of `visitors_per_day`, stopping at
/// the end of the first day where either arm has accumulated
/// `conversion_target` conversions.
///
/// `day_ceiling` bounds the trial so termination never depends on the
/// conversion rates; a trial that exhausts it is abandoned.
pub fn run_day_batched<R: Rng>(
    arms: &TrialArms,
    visitors_per_day: u32,
    conversion_target: u64,
    day_ceiling: u32,
    rng: &mut R,
) -> BatchedTrial {
    let mut state = TrialState::new();
    let mut days = 0u32;

    while days < day_ceiling {
        days += 1;
        for _ in 0..visitors_per_day {
            arms.step(&mut state, rng);
        }
        let leading = state
            .conversions_control()
            .max(state.conversions_variation());
        if leading >= conversion_target {
            let stop = match observed_winner(&state) {
                Some(outcome) => TrialStop::Decided(outcome),
                None => TrialStop::Abandoned,
            };
            return BatchedTrial { state, stop, days };
        }
    }

    debug!(
        days,
        conversion_target, "trial exhausted its day ceiling without reaching the target"
    );
    BatchedTrial {
        state,
        stop: TrialStop::Abandoned,
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn arms(control: f64, delta: f64) -> TrialArms {
        TrialArms::from_lift(ConversionRate::new(control).unwrap(), delta)
    }

    #[test]
    fn record_upholds_invariant() {
        let mut state = TrialState::new();
        let mut rng = StdRng::seed_from_u64(3);
        let a = arms(0.3, 0.1);
        for _ in 0..500 {
            a.step(&mut state, &mut rng);
            assert!(state.conversions_control() <= state.participants_control());
            assert!(state.conversions_variation() <= state.participants_variation());
        }
        assert_eq!(state.total_participants(), 500);
    }

    #[test]
    fn observed_rate_is_none_without_participants() {
        let state = TrialState::new();
        assert!(state.observed_rate(Arm::Control).is_none());
        assert!(observed_winner(&state).is_none());
    }

    #[test]
    fn observed_winner_requires_both_arms() {
        let state = TrialState::from_counts(10, 5, 0, 0).unwrap();
        assert!(observed_winner(&state).is_none());
    }

    #[test]
    fn observed_winner_compares_rates() {
        let control_ahead = TrialState::from_counts(100, 20, 100, 10).unwrap();
        assert_eq!(
            observed_winner(&control_ahead),
            Some(TrialOutcome::Control)
        );

        let variation_ahead = TrialState::from_counts(100, 10, 100, 20).unwrap();
        assert_eq!(
            observed_winner(&variation_ahead),
            Some(TrialOutcome::Variation)
        );

        // Different counts, identical rates.
        let tie = TrialState::from_counts(100, 10, 200, 20).unwrap();
        assert_eq!(observed_winner(&tie), Some(TrialOutcome::Tie));
    }

    #[test]
    fn sequential_trial_is_deterministic_for_fixed_seed() {
        let a = arms(0.1, 0.2);
        let rule = SignificanceTest::new(2000, 0.95).unwrap();

        let one = run_sequential(&a, &rule, &mut StdRng::seed_from_u64(99)).unwrap();
        let two = run_sequential(&a, &rule, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn sequential_trial_respects_ceiling() {
        // Zero lift and a tiny ceiling: almost always abandoned, and
        // never more than `ceiling` participants.
        let a = arms(0.1, 0.0);
        let rule = SignificanceTest::new(500, 0.999).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..20 {
            let trial = run_sequential(&a, &rule, &mut rng).unwrap();
            assert!(trial.state.total_participants() <= 500);
            if trial.state.total_participants() == 500 {
                assert_eq!(trial.stop, TrialStop::Abandoned);
            }
        }
    }

    #[test]
    fn sequential_trial_detects_a_huge_lift() {
        // 5% control vs 50% variation: the z-test should fire well
        // before the ceiling.
        let a = arms(0.05, 9.0);
        let rule = SignificanceTest::default();
        let trial = run_sequential(&a, &rule, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(trial.stop, TrialStop::Decided(TrialOutcome::Variation));
        assert!(trial.state.total_participants() < 10_000);
    }

    #[test]
    fn day_batched_trial_stops_on_conversion_target() {
        let a = arms(0.1, 0.0);
        let trial = run_day_batched(&a, 300, 50, 365, &mut StdRng::seed_from_u64(5));
        assert!(matches!(trial.stop, TrialStop::Decided(_)));
        let leading = trial
            .state
            .conversions_control()
            .max(trial.state.conversions_variation());
        assert!(leading >= 50);
        // ~15 conversions per arm per day; a handful of days suffices.
        assert!(trial.days >= 1 && trial.days < 30);
    }

    #[test]
    fn day_batched_trial_abandons_at_day_ceiling() {
        // A rate of zero never reaches any conversion target.
        let a = arms(0.0, 0.0);
        let trial = run_day_batched(&a, 10, 50, 30, &mut StdRng::seed_from_u64(5));
        assert_eq!(trial.days, 30);
        assert_eq!(trial.stop, TrialStop::Abandoned);
    }

    #[test]
    fn day_batched_trial_is_deterministic_for_fixed_seed() {
        let a = arms(0.1, 0.05);
        let one = run_day_batched(&a, 300, 50, 365, &mut StdRng::seed_from_u64(77));
        let two = run_day_batched(&a, 300, 50, 365, &mut StdRng::seed_from_u64(77));
        assert_eq!(one, two);
    }
}
