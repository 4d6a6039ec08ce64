//! Normal-distribution primitives
//!
//! Pure numeric functions backing the two-proportion z-test: error
//! function, cumulative distribution, density, and an approximate
//! inverse CDF. No state, no allocation.
//!
//! `erf` uses the Numerical-Recipes rational/exponential expansion
//! (fractional error below 1.2e-7 over the whole real line).
//! `inverse_cdf` uses the Beasley-Springer/Moro rational approximation
//! (absolute error around 4.5e-4, plenty for simulation work).

use crate::{Error, Result};

/// Gauss error function.
///
/// Fixed-coefficient polynomial in `1 / (1 + |z|/2)` evaluated with
/// Horner's method, negated for negative input via `erf(-z) = -erf(z)`.
#[must_use]
pub fn erf(z: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.5 * z.abs());

    let exponent = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = 1.0 - t * exponent.exp();

    if z >= 0.0 {
        ans
    } else {
        -ans
    }
}

/// Standard normal cumulative distribution, `0.5 * (1 + erf(z / sqrt(2)))`.
#[must_use]
pub fn cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Cumulative distribution of a normal with the given mean and standard
/// deviation, evaluated at `x`.
///
/// # Errors
///
/// Returns [`Error::DegenerateStdDev`] when `std <= 0`.
pub fn cdf_around(x: f64, mean: f64, std: f64) -> Result<f64> {
    if std <= 0.0 {
        return Err(Error::DegenerateStdDev { std });
    }
    Ok(cdf((x - mean) / std))
}

/// Gaussian probability density at `x` for the given mean and standard
/// deviation.
///
/// The exponent applies to the whole standardized value,
/// `((x - mean) / std)^2`.
///
/// # Errors
///
/// Returns [`Error::DegenerateStdDev`] when `std <= 0`.
pub fn pdf(x: f64, mean: f64, std: f64) -> Result<f64> {
    if std <= 0.0 {
        return Err(Error::DegenerateStdDev { std });
    }
    let standardized = (x - mean) / std;
    let norm = 1.0 / ((2.0 * std::f64::consts::PI).sqrt() * std);
    Ok(norm * (-0.5 * standardized * standardized).exp())
}

// Beasley-Springer/Moro rational-approximation coefficients.
const C0: f64 = 2.515_517;
const C1: f64 = 0.802_853;
const C2: f64 = 0.010_328;
const D1: f64 = 1.432_788;
const D2: f64 = 0.189_269;
const D3: f64 = 0.001_308;

// Floor for the tail probability so ln(1 / p^2) never divides by zero.
const MIN_TAIL: f64 = 1e-7;

/// Approximate inverse CDF (quantile function) of a normal with the
/// given mean and standard deviation.
///
/// Symmetric around `p = 0.5`; degenerate tails (`p` of exactly 0 or 1)
/// are clamped to a tail probability of 1e-7 rather than rejected.
///
/// # Errors
///
/// Returns [`Error::DegenerateStdDev`] when `std <= 0`, and
/// [`Error::InvalidProbability`] when `p` is NaN or outside [0, 1].
pub fn inverse_cdf(p: f64, mean: f64, std: f64) -> Result<f64> {
    if std <= 0.0 {
        return Err(Error::DegenerateStdDev { std });
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::InvalidProbability { value: p });
    }
    if (p - 0.5).abs() < f64::EPSILON {
        return Ok(mean);
    }

    let tail = if p > 0.5 { 1.0 - p } else { p }.max(MIN_TAIL);

    let t = (1.0 / (tail * tail)).ln().sqrt();
    let numer = C0 + C1 * t + C2 * t * t;
    let denom = 1.0 + D1 * t + D2 * t * t + D3 * t * t * t;
    let magnitude = t - numer / denom;

    let x = if p > 0.5 { magnitude } else { -magnitude };
    Ok(x * std + mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1.5e-7;

    #[test]
    fn erf_at_zero_is_zero() {
        assert!(erf(0.0).abs() < TOL);
    }

    #[test]
    fn erf_matches_reference_values() {
        // Abramowitz & Stegun table values.
        assert!((erf(1.0) - 0.842_700_79).abs() < 5e-7);
        assert!((erf(2.0) - 0.995_322_27).abs() < 5e-7);
        assert!((erf(0.5) - 0.520_499_88).abs() < 5e-7);
    }

    #[test]
    fn erf_is_odd() {
        for z in [0.1, 0.7, 1.3, 2.9, 4.2] {
            assert!((erf(-z) + erf(z)).abs() < TOL);
        }
    }

    #[test]
    fn cdf_at_zero_is_half() {
        assert!((cdf(0.0) - 0.5).abs() < TOL);
    }

    #[test]
    fn cdf_tails_saturate() {
        assert!(cdf(-5.0) < 1e-6);
        assert!(cdf(5.0) > 1.0 - 1e-6);
    }

    #[test]
    fn cdf_matches_reference_values() {
        assert!((cdf(1.96) - 0.975_002_1).abs() < 1e-6);
        assert!((cdf(-1.0) - 0.158_655_25).abs() < 1e-6);
    }

    #[test]
    fn cdf_around_standardizes() {
        let direct = cdf(1.5);
        let shifted = cdf_around(13.0, 10.0, 2.0).unwrap();
        assert!((direct - shifted).abs() < TOL);
    }

    #[test]
    fn cdf_around_rejects_zero_std() {
        assert!(matches!(
            cdf_around(1.0, 0.0, 0.0),
            Err(Error::DegenerateStdDev { .. })
        ));
    }

    #[test]
    fn pdf_standard_normal_peak() {
        // 1 / sqrt(2 pi)
        let peak = pdf(0.0, 0.0, 1.0).unwrap();
        assert!((peak - 0.398_942_280_4).abs() < 1e-9);
    }

    #[test]
    fn pdf_is_symmetric_around_mean() {
        let left = pdf(8.0, 10.0, 2.0).unwrap();
        let right = pdf(12.0, 10.0, 2.0).unwrap();
        assert!((left - right).abs() < 1e-12);
    }

    #[test]
    fn pdf_rejects_nonpositive_std() {
        assert!(pdf(0.0, 0.0, -1.0).is_err());
        assert!(pdf(0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn inverse_cdf_at_half_is_mean() {
        assert!((inverse_cdf(0.5, 42.0, 3.0).unwrap() - 42.0).abs() < TOL);
    }

    #[test]
    fn inverse_cdf_matches_cdf_within_approximation_error() {
        // BSM is good to ~4.5e-4 in z.
        for p in [0.05, 0.25, 0.6, 0.9, 0.975, 0.999] {
            let z = inverse_cdf(p, 0.0, 1.0).unwrap();
            assert!(
                (cdf(z) - p).abs() < 1e-3,
                "round-trip failed at p={p}: z={z}, cdf={}",
                cdf(z)
            );
        }
    }

    #[test]
    fn inverse_cdf_is_symmetric_around_half() {
        let lo = inverse_cdf(0.025, 0.0, 1.0).unwrap();
        let hi = inverse_cdf(0.975, 0.0, 1.0).unwrap();
        assert!((lo + hi).abs() < 1e-9);
        assert!((hi - 1.96).abs() < 5e-3);
    }

    #[test]
    fn inverse_cdf_clamps_degenerate_tails() {
        // p = 1 must not divide by zero; it lands at the clamped tail.
        let extreme = inverse_cdf(1.0, 0.0, 1.0).unwrap();
        assert!(extreme.is_finite());
        assert!(extreme > 4.0);

        let other = inverse_cdf(0.0, 0.0, 1.0).unwrap();
        assert!((extreme + other).abs() < 1e-9);
    }

    #[test]
    fn inverse_cdf_rejects_bad_probability() {
        assert!(matches!(
            inverse_cdf(1.5, 0.0, 1.0),
            Err(Error::InvalidProbability { .. })
        ));
        assert!(inverse_cdf(f64::NAN, 0.0, 1.0).is_err());
        assert!(inverse_cdf(-0.1, 0.0, 1.0).is_err());
    }

    #[test]
    fn inverse_cdf_scales_and_shifts() {
        let standard = inverse_cdf(0.9, 0.0, 1.0).unwrap();
        let scaled = inverse_cdf(0.9, 100.0, 15.0).unwrap();
        assert!((scaled - (100.0 + 15.0 * standard)).abs() < 1e-9);
    }
}
