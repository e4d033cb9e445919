//! Error regimes and error-structure flags.
//!
//! An [`ErrorRegime`] names which contamination sources act on the pooled
//! measurements; [`ErrorFlags`] refine how each source's variance depends on
//! the outcome and the pool size. Together with the model family and the
//! covariate count they fix the parameter layout (see `layout`).
use std::{fmt, str::FromStr};

use crate::pooling::errors::PoolError;

/// A contamination source acting on a pooled measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSource {
    /// Error introduced by physically pooling specimens; only pools with
    /// more than one member are affected.
    Processing,
    /// Assay error, present on every measurement.
    Measurement,
}

/// Which error sources are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorRegime {
    /// Measurements equal the pool-average exposure.
    #[default]
    Neither,
    Processing,
    Measurement,
    Both,
}

impl ErrorRegime {
    /// Error sources in parameter-layout order.
    pub fn sources(&self) -> &'static [ErrorSource] {
        match self {
            ErrorRegime::Neither => &[],
            ErrorRegime::Processing => &[ErrorSource::Processing],
            ErrorRegime::Measurement => &[ErrorSource::Measurement],
            ErrorRegime::Both => &[ErrorSource::Processing, ErrorSource::Measurement],
        }
    }

    pub fn has(&self, source: ErrorSource) -> bool {
        self.sources().contains(&source)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorRegime::Neither => "neither",
            ErrorRegime::Processing => "processing",
            ErrorRegime::Measurement => "measurement",
            ErrorRegime::Both => "both",
        }
    }
}

impl FromStr for ErrorRegime {
    type Err = PoolError;

    /// Case-insensitive; `"none"` is accepted for `Neither`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neither" | "none" => Ok(ErrorRegime::Neither),
            "processing" => Ok(ErrorRegime::Processing),
            "measurement" => Ok(ErrorRegime::Measurement),
            "both" => Ok(ErrorRegime::Both),
            _ => Err(PoolError::InvalidRegime { name: s.to_string() }),
        }
    }
}

impl fmt::Display for ErrorRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error-structure flags.
///
/// - `nondiff_pe`: processing-error variance shared by cases and controls.
/// - `nondiff_me`: measurement-error variance shared by cases and controls.
/// - `constant_pe`: processing-error variance does not grow with pool size;
///   when `false` it scales linearly with `g`.
///
/// All default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorFlags {
    pub nondiff_pe: bool,
    pub nondiff_me: bool,
    pub constant_pe: bool,
}

impl ErrorFlags {
    pub fn new(nondiff_pe: bool, nondiff_me: bool, constant_pe: bool) -> Self {
        ErrorFlags { nondiff_pe, nondiff_me, constant_pe }
    }

    pub fn is_nondifferential(&self, source: ErrorSource) -> bool {
        match source {
            ErrorSource::Processing => self.nondiff_pe,
            ErrorSource::Measurement => self.nondiff_me,
        }
    }
}

impl Default for ErrorFlags {
    fn default() -> Self {
        ErrorFlags { nondiff_pe: true, nondiff_me: true, constant_pe: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Regime names parse case-insensitively and round-trip through Display;
    // unknown names are validation errors.
    fn regime_parses_and_displays() {
        for regime in [
            ErrorRegime::Neither,
            ErrorRegime::Processing,
            ErrorRegime::Measurement,
            ErrorRegime::Both,
        ] {
            assert_eq!(regime.to_string().to_uppercase().parse::<ErrorRegime>(), Ok(regime));
        }
        assert_eq!("none".parse::<ErrorRegime>(), Ok(ErrorRegime::Neither));
        assert_eq!(
            "assay".parse::<ErrorRegime>(),
            Err(PoolError::InvalidRegime { name: "assay".to_string() })
        );
    }

    #[test]
    fn both_regime_lists_processing_before_measurement() {
        assert_eq!(
            ErrorRegime::Both.sources(),
            &[ErrorSource::Processing, ErrorSource::Measurement]
        );
        assert!(!ErrorRegime::Measurement.has(ErrorSource::Processing));
    }
}
