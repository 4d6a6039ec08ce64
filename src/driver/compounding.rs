//! Compounding-strategy mode
//!
//! Models an experimenter running back-to-back A/B tests for a
//! simulated year with a simple conversion-count stop rule. Every
//! variation win promotes the variation's true rate to become the next
//! trial's control baseline, so good decisions compound and bad ones
//! drag the rate down.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rates::{ConversionRate, LiftSet};
use crate::trial::{self, TrialOutcome, TrialStop};
use crate::Result;

use super::SimConfig;

/// Days in the simulated year.
pub const DAYS_PER_YEAR: u32 = 365;

/// Per-trial day ceiling. Guarantees termination independently of the
/// conversion rates; with realistic traffic it never binds (a target of
/// 50 conversions at 300 visitors/day resolves in a few days).
const TRIAL_DAY_CEILING: u32 = DAYS_PER_YEAR;

/// Scalar outputs of one compounding simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundingRun {
    /// Annualized growth rate implied by the final control rate.
    pub yearly_growth_rate: f64,
    /// Tests completed, extrapolated to a 365-day year.
    pub tests_per_year: f64,
    /// Simulated days actually consumed (may overshoot 365, the trial
    /// in flight at year end runs to completion).
    pub days: u32,
    /// Tests run.
    pub tests: u32,
    /// The control's true conversion rate after the final promotion.
    pub final_rate: f64,
}

/// Annualize the growth implied by reaching `final_rate` from
/// `baseline` over `days`: solve for the constant daily compounding
/// rate over the days actually elapsed, then compound it to exactly
/// 365 days.
#[must_use]
pub fn yearly_growth_rate(final_rate: f64, baseline: f64, days: u32) -> f64 {
    let overall = final_rate / baseline - 1.0;
    let daily = (1.0 + overall).powf(1.0 / f64::from(days)) - 1.0;
    (1.0 + daily).powf(f64::from(DAYS_PER_YEAR)) - 1.0
}

/// Run one year-long compounding simulation.
#[allow(clippy::cast_precision_loss)]
pub(super) fn run_compounding<R: Rng>(
    config: &SimConfig,
    lifts: &LiftSet,
    rng: &mut R,
) -> Result<CompoundingRun> {
    let baseline = ConversionRate::new(config.baseline_rate)?;
    let mut control = baseline;
    let mut days = 0u32;
    let mut tests = 0u32;

    while days < DAYS_PER_YEAR {
        let delta = lifts.sample(rng);
        let arms = trial::TrialArms::from_lift(control, delta);
        tests += 1;
        debug!(
            test = tests,
            control = control.value(),
            variation = arms.variation().value(),
            true_lift = arms.true_lift(),
            "starting trial"
        );

        let outcome = trial::run_day_batched(
            &arms,
            config.visitors_per_day,
            config.conversion_target,
            TRIAL_DAY_CEILING,
            rng,
        );
        days += outcome.days;

        match outcome.stop {
            TrialStop::Decided(TrialOutcome::Variation) => {
                debug!(
                    test = tests,
                    days,
                    good_choice = arms.true_lift() >= 0.0,
                    promoted_rate = arms.variation().value(),
                    "variation wins, promoting its true rate"
                );
                control = arms.variation();
            }
            TrialStop::Decided(winner) => {
                debug!(
                    test = tests,
                    days,
                    ?winner,
                    good_choice = arms.true_lift() <= 0.0,
                    "keeping the control"
                );
            }
            TrialStop::Abandoned => {
                debug!(test = tests, days, "trial abandoned, keeping the control");
            }
        }
    }

    Ok(CompoundingRun {
        yearly_growth_rate: yearly_growth_rate(control.value(), baseline.value(), days),
        tests_per_year: f64::from(tests) / f64::from(days) * f64::from(DAYS_PER_YEAR),
        days,
        tests,
        final_rate: control.value(),
    })
}
