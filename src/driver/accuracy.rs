//! Decision-accuracy mode
//!
//! Runs many independent visitor-by-visitor trials under the
//! statistical stopping rule and scores each decision against the
//! ground truth only the simulator knows.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rates::{ConversionRate, LiftSet};
use crate::significance::SignificanceTest;
use crate::trial::{self, TrialOutcome, TrialStop};
use crate::Result;

use super::SimConfig;

/// Classification of one resolved trial against the true lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionRecord {
    /// The declared winner matches the sign of the true lift (or there
    /// was no real effect to get wrong).
    Correct,
    /// The declared winner contradicts the true lift.
    Incorrect,
    /// The trial was abandoned; the strategy declined to decide.
    Passed,
}

/// Score a trial stop against the ground-truth lift.
///
/// A tie or a zero true lift can never be wrong: when there is no real
/// effect, either answer leaves the experimenter no worse off.
#[must_use]
pub fn classify(stop: TrialStop, true_lift: f64) -> DecisionRecord {
    match stop {
        TrialStop::Abandoned => DecisionRecord::Passed,
        TrialStop::Decided(TrialOutcome::Tie) => DecisionRecord::Correct,
        TrialStop::Decided(TrialOutcome::Variation) => {
            if true_lift >= 0.0 {
                DecisionRecord::Correct
            } else {
                DecisionRecord::Incorrect
            }
        }
        TrialStop::Decided(TrialOutcome::Control) => {
            if true_lift <= 0.0 {
                DecisionRecord::Correct
            } else {
                DecisionRecord::Incorrect
            }
        }
    }
}

/// Per-run tally of decision classifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTally {
    /// Trials the strategy declined to decide.
    pub passed: u64,
    /// Correct decisions.
    pub correct: u64,
    /// Incorrect decisions.
    pub incorrect: u64,
}

impl DecisionTally {
    /// Fold one classification in.
    pub fn record(&mut self, record: DecisionRecord) {
        match record {
            DecisionRecord::Passed => self.passed += 1,
            DecisionRecord::Correct => self.correct += 1,
            DecisionRecord::Incorrect => self.incorrect += 1,
        }
    }

    /// Total trials tallied.
    #[must_use]
    pub const fn trials(&self) -> u64 {
        self.passed + self.correct + self.incorrect
    }

    /// Fraction of resolved decisions that were correct, `None` when no
    /// trial resolved.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> Option<f64> {
        let resolved = self.correct + self.incorrect;
        if resolved == 0 {
            None
        } else {
            Some(self.correct as f64 / resolved as f64)
        }
    }
}

/// Run `trials_per_run` independent sequential trials and tally the
/// decision quality.
pub(super) fn run_accuracy<R: Rng>(
    config: &SimConfig,
    lifts: &LiftSet,
    rule: &SignificanceTest,
    rng: &mut R,
) -> Result<DecisionTally> {
    let baseline = ConversionRate::new(config.baseline_rate)?;
    let mut tally = DecisionTally::default();

    for test in 0..config.trials_per_run {
        let delta = lifts.sample(rng);
        let arms = trial::TrialArms::from_lift(baseline, delta);
        let trial = trial::run_sequential(&arms, rule, rng)?;
        let record = classify(trial.stop, arms.true_lift());
        debug!(
            test,
            true_lift = arms.true_lift(),
            participants = trial.state.total_participants(),
            ?record,
            "trial scored"
        );
        tally.record(record);
    }

    Ok(tally)
}
