//! Decision & strategy driver
//!
//! Orchestrates repeated trials: fans out many independent simulation
//! runs, applies the chosen strategy within each, and reports the
//! arithmetic mean of the per-run scalars.
//!
//! Runs are statistically independent, so with the `parallel` feature
//! they fan out across a rayon pool; each run derives its own RNG from
//! the base seed, so serial and parallel execution produce identical
//! aggregates.

mod accuracy;
mod compounding;

pub use accuracy::{classify, DecisionRecord, DecisionTally};
pub use compounding::{yearly_growth_rate, CompoundingRun, DAYS_PER_YEAR};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::rates::{ConversionRate, LiftSet};
use crate::significance::{SignificanceTest, DEFAULT_CONFIDENCE, DEFAULT_PARTICIPANT_CEILING};
use crate::{Error, Result};

/// Configuration for a batch of simulation runs.
///
/// The defaults mirror the scenario the simulator was built to study:
/// 300 visitors a day against a 10% baseline, with the weighted lift
/// multiset `[-0.1, -0.1, -0.05, 0, 0, 0, 0.05, 0.1, 0.1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Visitors arriving per simulated day (compounding mode batches).
    pub visitors_per_day: u32,
    /// The control's true conversion rate at the start of each run.
    pub baseline_rate: f64,
    /// Candidate true relative lifts; one is drawn uniformly per trial.
    pub lifts: Vec<f64>,
    /// Independent simulation runs to average over.
    pub simulation_runs: u32,
    /// Trials per run in decision-accuracy mode.
    pub trials_per_run: u32,
    /// Total-participant ceiling before the statistical rule abandons.
    pub participant_ceiling: u64,
    /// Confidence threshold for declaring a winner.
    pub confidence: f64,
    /// Conversions either arm must reach to stop a compounding-mode trial.
    pub conversion_target: u64,
    /// Base RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            visitors_per_day: 300,
            baseline_rate: 0.10,
            lifts: vec![-0.1, -0.1, -0.05, 0.0, 0.0, 0.0, 0.05, 0.1, 0.1],
            simulation_runs: 100,
            trials_per_run: 100,
            participant_ceiling: DEFAULT_PARTICIPANT_CEILING,
            confidence: DEFAULT_CONFIDENCE,
            conversion_target: 50,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Validate every field, with an actionable message on failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] (or [`Error::InvalidProbability`]
    /// for the baseline rate) naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.visitors_per_day == 0 {
            return Err(Error::InvalidConfig(
                "visitors_per_day must be at least 1".to_string(),
            ));
        }
        let baseline = ConversionRate::new(self.baseline_rate)?;
        if baseline.value() <= 0.0 {
            return Err(Error::InvalidConfig(
                "baseline_rate must be strictly positive (growth is measured relative to it)"
                    .to_string(),
            ));
        }
        if self.simulation_runs == 0 {
            return Err(Error::InvalidConfig(
                "simulation_runs must be at least 1".to_string(),
            ));
        }
        if self.trials_per_run == 0 {
            return Err(Error::InvalidConfig(
                "trials_per_run must be at least 1".to_string(),
            ));
        }
        if self.conversion_target == 0 {
            return Err(Error::InvalidConfig(
                "conversion_target must be at least 1".to_string(),
            ));
        }
        self.lift_set()?;
        self.significance_test()?;
        Ok(())
    }

    pub(crate) fn lift_set(&self) -> Result<LiftSet> {
        LiftSet::new(self.lifts.clone())
    }

    pub(crate) fn significance_test(&self) -> Result<SignificanceTest> {
        SignificanceTest::new(self.participant_ceiling, self.confidence)
    }

    fn base_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::thread_rng().gen())
    }
}

/// Derive a per-run RNG from the base seed. Weyl-sequence spacing keeps
/// the per-run seeds distinct without correlated low bits.
fn run_rng(base_seed: u64, run: u32) -> StdRng {
    let seed = base_seed.wrapping_add(u64::from(run).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    StdRng::seed_from_u64(seed)
}

/// Execute `runs` independent runs, each with its own derived RNG.
fn run_all<T, F>(runs: u32, base_seed: u64, per_run: F) -> Vec<Result<T>>
where
    T: Send,
    F: Fn(&mut StdRng) -> Result<T> + Sync,
{
    #[cfg(feature = "parallel")]
    {
        (0..runs)
            .into_par_iter()
            .map(|run| per_run(&mut run_rng(base_seed, run)))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..runs)
            .map(|run| per_run(&mut run_rng(base_seed, run)))
            .collect()
    }
}

/// Keep the successful runs, log and count the failed ones. A numeric
/// failure aborts its own run, never the whole batch.
fn fold_runs<T>(results: Vec<Result<T>>) -> Result<(Vec<T>, u32)> {
    let mut succeeded = Vec::with_capacity(results.len());
    let mut failed = 0u32;
    for (run, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => succeeded.push(value),
            Err(error) => {
                warn!(run, %error, "simulation run failed, excluding it from the aggregate");
                failed += 1;
            }
        }
    }
    if succeeded.is_empty() {
        return Err(Error::AllRunsFailed { failed });
    }
    Ok((succeeded, failed))
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u64;
    for value in values {
        sum += value;
        count += 1;
    }
    sum / count as f64
}

/// Aggregate of the compounding-strategy mode across runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundingReport {
    /// Mean annualized growth rate across successful runs.
    pub mean_yearly_growth_rate: f64,
    /// Mean tests-per-year across successful runs.
    pub mean_tests_per_year: f64,
    /// Successful runs aggregated.
    pub runs: u32,
    /// Runs excluded because they failed.
    pub failed_runs: u32,
}

impl CompoundingReport {
    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{:.0}% per year over {:.0} tests",
            self.mean_yearly_growth_rate * 100.0,
            self.mean_tests_per_year
        )
    }
}

/// Aggregate of the decision-accuracy mode across runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Mean passed (undecided) trials per run.
    pub mean_passed: f64,
    /// Mean correct decisions per run.
    pub mean_correct: f64,
    /// Mean incorrect decisions per run.
    pub mean_incorrect: f64,
    /// Correct fraction of resolved decisions across all runs, `None`
    /// when nothing resolved.
    pub accuracy: Option<f64>,
    /// Successful runs aggregated.
    pub runs: u32,
    /// Runs excluded because they failed.
    pub failed_runs: u32,
}

impl AccuracyReport {
    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let accuracy = self.accuracy.map_or_else(
            || "N/A".to_string(),
            |fraction| format!("{:.1}%", fraction * 100.0),
        );
        format!(
            "passed: {:.1}, correct: {:.1}, incorrect: {:.1}, correct decisions: {accuracy}",
            self.mean_passed, self.mean_correct, self.mean_incorrect
        )
    }
}

/// Run the compounding-strategy experiment and average across runs.
///
/// # Errors
///
/// Returns a validation error up front, or [`Error::AllRunsFailed`] if
/// no run produced a usable result.
pub fn simulate_compounding(config: &SimConfig) -> Result<CompoundingReport> {
    config.validate()?;
    let lifts = config.lift_set()?;
    let base_seed = config.base_seed();
    info!(
        runs = config.simulation_runs,
        base_seed, "starting compounding-strategy simulation"
    );

    let results = run_all(config.simulation_runs, base_seed, |rng| {
        compounding::run_compounding(config, &lifts, rng)
    });
    let (runs, failed_runs) = fold_runs(results)?;

    let report = CompoundingReport {
        mean_yearly_growth_rate: mean(runs.iter().map(|r| r.yearly_growth_rate)),
        mean_tests_per_year: mean(runs.iter().map(|r| r.tests_per_year)),
        runs: u32::try_from(runs.len()).unwrap_or(u32::MAX),
        failed_runs,
    };
    info!(summary = %report.summary(), failed_runs, "compounding simulation finished");
    Ok(report)
}

/// Run the decision-accuracy experiment and average across runs.
///
/// # Errors
///
/// Returns a validation error up front, or [`Error::AllRunsFailed`] if
/// no run produced a usable result.
#[allow(clippy::cast_precision_loss)]
pub fn simulate_accuracy(config: &SimConfig) -> Result<AccuracyReport> {
    config.validate()?;
    let lifts = config.lift_set()?;
    let rule = config.significance_test()?;
    let base_seed = config.base_seed();
    info!(
        runs = config.simulation_runs,
        trials_per_run = config.trials_per_run,
        base_seed,
        "starting decision-accuracy simulation"
    );

    let results = run_all(config.simulation_runs, base_seed, |rng| {
        accuracy::run_accuracy(config, &lifts, &rule, rng)
    });
    let (runs, failed_runs) = fold_runs(results)?;

    let total: DecisionTally = runs.iter().fold(DecisionTally::default(), |mut acc, t| {
        acc.passed += t.passed;
        acc.correct += t.correct;
        acc.incorrect += t.incorrect;
        acc
    });
    let report = AccuracyReport {
        mean_passed: mean(runs.iter().map(|t| t.passed as f64)),
        mean_correct: mean(runs.iter().map(|t| t.correct as f64)),
        mean_incorrect: mean(runs.iter().map(|t| t.incorrect as f64)),
        accuracy: total.accuracy(),
        runs: u32::try_from(runs.len()).unwrap_or(u32::MAX),
        failed_runs,
    };
    info!(summary = %report.summary(), failed_runs, "decision-accuracy simulation finished");
    Ok(report)
}
