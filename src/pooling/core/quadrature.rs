//! Latent-variable integrator — adaptive Gauss–Kronrod (7/15).
//!
//! Purpose
//! -------
//! Integrate the joint density of a pool's outcome and surrogate
//! measurements over the unobserved pool-average exposure `X̄`. The
//! integrand is supplied on the log scale in `X̄`-space; this module maps it
//! onto a bounded domain and integrates there.
//!
//! Key behaviors
//! -------------
//! - [`LatentDomain::SymmetricUnit`]: `X̄ ∈ ℝ`, `t ∈ (−1, 1)`,
//!   `X̄ = t/(1−t²)`, Jacobian `(1+t²)/(1−t²)²`.
//! - [`LatentDomain::PositiveUnit`]: `X̄ ∈ (0, ∞)`, `t ∈ (0, 1)`,
//!   `X̄ = t/(1−t)`, Jacobian `1/(1−t)²`.
//! - [`integrate_interval`] runs globally adaptive bisection of the
//!   subinterval with the largest `|K15 − G7|` until the error estimate is
//!   below `max(abs_tol, rel_tol·|I|)` or the subdivision cap is reached.
//! - A zero or non-finite result triggers one re-scan: the interval is
//!   sampled on a uniform grid, shrunk to the region where the integrand is
//!   strictly positive (plus a margin), and integrated again.
//!
//! Invariants & assumptions
//! ------------------------
//! - [`Integral::Value`] always holds a finite, strictly positive number;
//!   an exact zero is never reported as a valid density.
//! - Kronrod nodes are interior, so the transforms are never evaluated at
//!   the singular endpoints.
//! - Hitting the subdivision cap returns the current estimate rather than
//!   failing.
//!
//! Testing notes
//! -------------
//! - Unit tests integrate normalized densities on both domains, recover a
//!   narrow bump that every initial node misses, and report identically
//!   zero and NaN integrands as degenerate.
use crate::pooling::core::options::IntegrationOptions;

// ---- Gauss–Kronrod 7/15 nodes and weights (QUADPACK qk15) ----

const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_2,
    0.140_653_259_715_525_9,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_8,
];

// Gauss weights for the nodes XGK[1], XGK[3], XGK[5], XGK[7].
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

/// Bounded domain the latent exposure is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatentDomain {
    /// `X̄ ∈ ℝ` through `t ∈ (−1, 1)`.
    SymmetricUnit,
    /// `X̄ ∈ (0, ∞)` through `t ∈ (0, 1)`.
    PositiveUnit,
}

impl LatentDomain {
    pub fn interval(&self) -> (f64, f64) {
        match self {
            LatentDomain::SymmetricUnit => (-1.0, 1.0),
            LatentDomain::PositiveUnit => (0.0, 1.0),
        }
    }

    /// `(X̄(t), ln |dX̄/dt|)`.
    pub fn map(&self, t: f64) -> (f64, f64) {
        match self {
            LatentDomain::SymmetricUnit => {
                let one_m = 1.0 - t * t;
                (t / one_m, (1.0 + t * t).ln() - 2.0 * one_m.ln())
            }
            LatentDomain::PositiveUnit => {
                let one_m = 1.0 - t;
                (t / one_m, -2.0 * one_m.ln())
            }
        }
    }
}

/// Outcome of one integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Integral {
    /// Finite, strictly positive value.
    Value(f64),
    /// Zero or non-finite even after the re-scan.
    Degenerate,
}

impl Integral {
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Integral::Degenerate)
    }
}

/// Integrate `exp(ln_f(X̄))` over the whole latent domain.
///
/// Parameters
/// ----------
/// - `domain`: support of `X̄`.
/// - `ln_f`: log-integrand in `X̄`-space; `−∞` is a valid zero.
/// - `opts`: tolerances, subdivision cap, and re-scan settings.
pub fn integrate_latent<F>(domain: LatentDomain, ln_f: F, opts: &IntegrationOptions) -> Integral
where
    F: Fn(f64) -> f64,
{
    let (a, b) = domain.interval();
    let integrand = |t: f64| {
        let (x, ln_jac) = domain.map(t);
        (ln_f(x) + ln_jac).exp()
    };
    integrate_interval(integrand, a, b, opts)
}

/// Integrate `f` over `[a, b]` with the degeneracy re-scan.
pub fn integrate_interval<F>(f: F, a: f64, b: f64, opts: &IntegrationOptions) -> Integral
where
    F: Fn(f64) -> f64,
{
    let first = adaptive_gk(&f, a, b, opts);
    if is_valid(first) {
        return Integral::Value(first);
    }
    match positive_region(&f, a, b, opts) {
        Some((lo, hi)) => {
            let retry = adaptive_gk(&f, lo, hi, opts);
            if is_valid(retry) { Integral::Value(retry) } else { Integral::Degenerate }
        }
        None => Integral::Degenerate,
    }
}

// ---- Helper methods ----

fn is_valid(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// One K15 panel: `(kronrod, |kronrod − gauss|)`.
fn gk15<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> (f64, f64) {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let fc = f(center);
    let mut kronrod = WGK[7] * fc;
    let mut gauss = WG[3] * fc;
    for j in 0..7 {
        let dx = half * XGK[j];
        let pair = f(center - dx) + f(center + dx);
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }
    (kronrod * half, ((kronrod - gauss) * half).abs())
}

struct Panel {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

fn adaptive_gk<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64, opts: &IntegrationOptions) -> f64 {
    let (value, error) = gk15(f, a, b);
    let mut panels = vec![Panel { a, b, value, error }];
    loop {
        let total: f64 = panels.iter().map(|p| p.value).sum();
        let total_err: f64 = panels.iter().map(|p| p.error).sum();
        if !total.is_finite() || !total_err.is_finite() {
            return total;
        }
        if total_err <= opts.abs_tol.max(opts.rel_tol * total.abs())
            || panels.len() >= opts.max_subdivisions
        {
            return total;
        }
        let worst = panels
            .iter()
            .enumerate()
            .max_by(|(_, p), (_, q)| p.error.total_cmp(&q.error))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let Panel { a, b, .. } = panels.swap_remove(worst);
        let mid = 0.5 * (a + b);
        for (lo, hi) in [(a, mid), (mid, b)] {
            let (value, error) = gk15(f, lo, hi);
            panels.push(Panel { a: lo, b: hi, value, error });
        }
    }
}

/// Smallest interval, padded by the margin, covering every grid point where
/// `f` is finite and strictly positive.
fn positive_region<F: Fn(f64) -> f64>(
    f: &F, a: f64, b: f64, opts: &IntegrationOptions,
) -> Option<(f64, f64)> {
    let n = opts.rescan_points;
    let step = (b - a) / n as f64;
    let positive: Vec<f64> = (0..n)
        .map(|i| a + (i as f64 + 0.5) * step)
        .filter(|&t| is_valid(f(t)))
        .collect();
    let (first, last) = (positive.first()?, positive.last()?);
    let margin = (opts.rescan_margin * (b - a)).max(step);
    Some(((first - margin).max(a), (last + margin).min(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pooling::core::densities::{ln_gamma_pdf, ln_normal_pdf};
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // Normalized densities integrate to one on both latent domains.
    fn densities_integrate_to_one_on_both_domains() {
        // Arrange
        let opts = IntegrationOptions::default();

        // Act
        let normal = integrate_latent(
            LatentDomain::SymmetricUnit,
            |x| ln_normal_pdf(x, 1.5, 0.8),
            &opts,
        );
        let gamma =
            integrate_latent(LatentDomain::PositiveUnit, |x| ln_gamma_pdf(x, 3.0, 0.7), &opts);

        // Assert
        match (normal, gamma) {
            (Integral::Value(n), Integral::Value(g)) => {
                assert_relative_eq!(n, 1.0, max_relative = 1e-6);
                assert_relative_eq!(g, 1.0, max_relative = 1e-6);
            }
            other => panic!("expected values, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // A bump too narrow for the first panel is recovered by the re-scan.
    //
    // Given
    // -----
    // - Gaussian bump at t = 0.91 with sd 1e-4 on [0, 1]; every K15 node of
    //   the first panel evaluates to exactly zero.
    //
    // Expect
    // ------
    // - The re-scan locates the bump and the integral is `sd·√(2π)`.
    fn narrow_bump_is_recovered_by_rescan() {
        // Arrange
        let sd: f64 = 1e-4;
        let bump = |t: f64| (-0.5 * ((t - 0.91) / sd).powi(2)).exp();
        let opts = IntegrationOptions::default();
        assert_eq!(gk15(&bump, 0.0, 1.0).0, 0.0);

        // Act
        let result = integrate_interval(bump, 0.0, 1.0, &opts);

        // Assert
        let expected = sd * (2.0 * std::f64::consts::PI).sqrt();
        match result {
            Integral::Value(v) => assert_relative_eq!(v, expected, max_relative = 1e-5),
            Integral::Degenerate => panic!("bump should be recovered"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Zero and NaN integrands are degenerate, never a zero density.
    fn zero_and_nan_integrands_are_degenerate() {
        let opts = IntegrationOptions::default();
        assert!(integrate_interval(|_| 0.0, -1.0, 1.0, &opts).is_degenerate());
        assert!(integrate_interval(|_| f64::NAN, 0.0, 1.0, &opts).is_degenerate());
        assert!(integrate_latent(LatentDomain::PositiveUnit, |_| f64::NEG_INFINITY, &opts)
            .is_degenerate());
    }

    #[test]
    fn latent_maps_are_monotone_with_positive_jacobian() {
        let (x, lj) = LatentDomain::SymmetricUnit.map(0.0);
        assert_eq!((x, lj), (0.0, 0.0));
        let (x, lj) = LatentDomain::PositiveUnit.map(0.5);
        assert_relative_eq!(x, 1.0);
        assert_relative_eq!(lj, 4.0f64.ln());
    }
}
