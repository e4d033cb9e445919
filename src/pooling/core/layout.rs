//! Parameter layout — labels, kinds, and default vectors for θ.
//!
//! Purpose
//! -------
//! Fix the order and meaning of every entry of the parameter vector once the
//! model family, error regime, flags, and covariate count are chosen. Start
//! and bound vectors, the variance-covariance matrix, and the labelled
//! estimates all follow this order.
//!
//! Key behaviors
//! -------------
//! - Family block first:
//!   - logistic: `beta_0, beta_x, beta_c1.., alpha_0, alpha_c1.., sigsq_x`;
//!   - gamma DFA: `gamma_0, gamma_c1.., b1, b0`.
//! - Error block second, one entry per [`VarianceTerm`] produced by the
//!   static table [`VARIANCE_TERM_TABLE`] for each source of the regime.
//! - Each entry is tagged [`ParamKind::NonVariance`] or
//!   [`ParamKind::Variance`]; variance-kind entries must stay positive.
//!
//! Invariants & assumptions
//! ------------------------
//! - Construction is deterministic: identical inputs give identical layouts.
//! - Differential error sources contribute a case term before a control term.
//!
//! Downstream usage
//! ----------------
//! - Options broadcast `(non-variance, variance)` scalar pairs through
//!   [`ParamLayout::broadcast`].
//! - Models decode their family block by position and the error block via
//!   [`ParamLayout::error_variances`].
use ndarray::{Array1, ArrayView1};

use crate::pooling::core::regime::{ErrorFlags, ErrorRegime, ErrorSource};

/// Model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    /// Pooled logistic regression with a normal exposure model.
    Logistic,
    /// Gamma discriminant-function approach.
    GammaDfa,
}

/// Whether a parameter is a free coefficient or a positive scale/variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    NonVariance,
    Variance,
}

/// One error-variance entry of θ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarianceTerm {
    ProcessingShared,
    ProcessingCase,
    ProcessingControl,
    MeasurementShared,
    MeasurementCase,
    MeasurementControl,
}

impl VarianceTerm {
    pub fn label(&self) -> &'static str {
        match self {
            VarianceTerm::ProcessingShared => "sigsq_p",
            VarianceTerm::ProcessingCase => "sigsq_p1",
            VarianceTerm::ProcessingControl => "sigsq_p0",
            VarianceTerm::MeasurementShared => "sigsq_m",
            VarianceTerm::MeasurementCase => "sigsq_m1",
            VarianceTerm::MeasurementControl => "sigsq_m0",
        }
    }
}

/// `(source, nondifferential) → variance terms`.
pub static VARIANCE_TERM_TABLE: [(ErrorSource, bool, &[VarianceTerm]); 4] = [
    (ErrorSource::Processing, true, &[VarianceTerm::ProcessingShared]),
    (
        ErrorSource::Processing,
        false,
        &[VarianceTerm::ProcessingCase, VarianceTerm::ProcessingControl],
    ),
    (ErrorSource::Measurement, true, &[VarianceTerm::MeasurementShared]),
    (
        ErrorSource::Measurement,
        false,
        &[VarianceTerm::MeasurementCase, VarianceTerm::MeasurementControl],
    ),
];

fn variance_terms(source: ErrorSource, nondiff: bool) -> &'static [VarianceTerm] {
    VARIANCE_TERM_TABLE
        .iter()
        .find(|(s, n, _)| *s == source && *n == nondiff)
        .map(|(_, _, terms)| *terms)
        .unwrap_or(&[])
}

fn covariate_labels(
    prefix: &'static str, n_covariates: usize,
) -> impl Iterator<Item = (String, ParamKind)> {
    (1..=n_covariates).map(move |j| (format!("{prefix}_c{j}"), ParamKind::NonVariance))
}

/// Error variances decoded from θ, indexed by outcome (`[control, case]`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorVariances {
    pub processing: [f64; 2],
    pub measurement: [f64; 2],
}

impl ErrorVariances {
    /// Per-replicate error variance `τ²` for a pool of size `g` with outcome
    /// `y`. Processing error only affects `g > 1`; it scales with `g` unless
    /// `constant_pe`.
    pub fn total(&self, size: usize, outcome: u8, constant_pe: bool) -> f64 {
        let y = usize::from(outcome.min(1));
        let processing = if size > 1 {
            let scale = if constant_pe { 1.0 } else { size as f64 };
            self.processing[y] * scale
        } else {
            0.0
        };
        processing + self.measurement[y]
    }
}

/// Ordered, labelled description of θ.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    family: ModelFamily,
    regime: ErrorRegime,
    flags: ErrorFlags,
    n_covariates: usize,
    labels: Vec<String>,
    kinds: Vec<ParamKind>,
    error_terms: Vec<(usize, VarianceTerm)>,
}

impl ParamLayout {
    pub fn new(
        family: ModelFamily, regime: ErrorRegime, flags: ErrorFlags, n_covariates: usize,
    ) -> Self {
        let coef = |label: String| (label, ParamKind::NonVariance);
        let covariate_block = |prefix: &'static str| covariate_labels(prefix, n_covariates);

        let mut entries: Vec<(String, ParamKind)> = match family {
            ModelFamily::Logistic => std::iter::once(coef("beta_0".into()))
                .chain(std::iter::once(coef("beta_x".into())))
                .chain(covariate_block("beta"))
                .chain(std::iter::once(coef("alpha_0".into())))
                .chain(covariate_block("alpha"))
                .chain(std::iter::once(("sigsq_x".to_string(), ParamKind::Variance)))
                .collect(),
            ModelFamily::GammaDfa => std::iter::once(coef("gamma_0".into()))
                .chain(covariate_block("gamma"))
                .chain([
                    ("b1".to_string(), ParamKind::Variance),
                    ("b0".to_string(), ParamKind::Variance),
                ])
                .collect(),
        };

        let mut error_terms = Vec::new();
        for &source in regime.sources() {
            for &term in variance_terms(source, flags.is_nondifferential(source)) {
                error_terms.push((entries.len(), term));
                entries.push((term.label().to_string(), ParamKind::Variance));
            }
        }
        let (labels, kinds): (Vec<String>, Vec<ParamKind>) = entries.into_iter().unzip();

        ParamLayout { family, regime, flags, n_covariates, labels, kinds, error_terms }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn regime(&self) -> ErrorRegime {
        self.regime
    }

    pub fn flags(&self) -> ErrorFlags {
        self.flags
    }

    pub fn n_covariates(&self) -> usize {
        self.n_covariates
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn kinds(&self) -> &[ParamKind] {
        &self.kinds
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Fill a vector with `nonvar` for coefficient entries and `var` for
    /// variance entries.
    pub fn broadcast(&self, nonvar: f64, var: f64) -> Array1<f64> {
        self.kinds
            .iter()
            .map(|k| match k {
                ParamKind::NonVariance => nonvar,
                ParamKind::Variance => var,
            })
            .collect()
    }

    /// Decode the error block of `theta`; absent sources contribute zero.
    pub fn error_variances(&self, theta: ArrayView1<f64>) -> ErrorVariances {
        let mut ev = ErrorVariances::default();
        for &(pos, term) in &self.error_terms {
            let v = theta[pos];
            match term {
                VarianceTerm::ProcessingShared => ev.processing = [v, v],
                VarianceTerm::ProcessingCase => ev.processing[1] = v,
                VarianceTerm::ProcessingControl => ev.processing[0] = v,
                VarianceTerm::MeasurementShared => ev.measurement = [v, v],
                VarianceTerm::MeasurementCase => ev.measurement[1] = v,
                VarianceTerm::MeasurementControl => ev.measurement[0] = v,
            }
        }
        ev
    }
}
