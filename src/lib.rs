//! # Splitsim: Sequential A/B Testing Strategy Simulator
//!
//! Splitsim is a Monte Carlo simulator that pits an A/B testing
//! decision strategy against ground truth it alone knows. It models an
//! experimenter running many independent tests over a simulated year,
//! stopping each one with a sequential rule, and measures what that
//! strategy actually earns (compounded conversion-rate growth) and how
//! often it picks the right arm.
//!
//! ## Components
//!
//! - [`dist`]: normal-distribution primitives (erf, cdf, pdf, inverse
//!   cdf) backing the significance math.
//! - [`significance`]: the two-proportion z-test and the sequential
//!   Continue / `DeclareWinner` / Abandon stopping rule.
//! - [`trial`]: the per-test engine drawing visitors one at a time or
//!   in daily batches.
//! - [`driver`]: configuration, the two experiment modes, and the
//!   cross-run aggregation.
//!
//! ## Example
//!
//! ```rust
//! use splitsim::driver::{simulate_compounding, SimConfig};
//!
//! let config = SimConfig {
//!     simulation_runs: 2,
//!     seed: Some(7),
//!     ..SimConfig::default()
//! };
//! let report = simulate_compounding(&config)?;
//! println!("{}", report.summary());
//! # Ok::<(), splitsim::Error>(())
//! ```
//!
//! Everything is synchronous and single-threaded by default; the
//! `parallel` feature fans independent runs out over rayon without
//! changing any result.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod dist;
pub mod driver;
pub mod error;
pub mod rates;
pub mod significance;
pub mod trial;

pub use error::{Error, Result};
