use std::fmt;
use std::str::FromStr;

pub use mzpeaks::Tolerance;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fragmentation technique used to acquire a spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationMethod {
    CID,
    ETD,
    HCD,
    PQD,
    UVPD,
    FUSION,
}

impl ActivationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ActivationMethod::CID => "CID",
            ActivationMethod::ETD => "ETD",
            ActivationMethod::HCD => "HCD",
            ActivationMethod::PQD => "PQD",
            ActivationMethod::UVPD => "UVPD",
            ActivationMethod::FUSION => "FUSION",
        }
    }
}

impl fmt::Display for ActivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CID" => Ok(ActivationMethod::CID),
            "ETD" => Ok(ActivationMethod::ETD),
            "HCD" => Ok(ActivationMethod::HCD),
            "PQD" => Ok(ActivationMethod::PQD),
            "UVPD" => Ok(ActivationMethod::UVPD),
            "FUSION" | "ETD+CID" => Ok(ActivationMethod::FUSION),
            _ => Err(Error::UnknownActivationMethod(s.to_string())),
        }
    }
}

/// Raw tolerance value in its own unit, Dalton or parts per million.
pub fn tolerance_value(tolerance: &Tolerance) -> f64 {
    match tolerance {
        Tolerance::Da(value) | Tolerance::PPM(value) => *value,
    }
}

/// Whether the tolerance describes a usable, strictly positive window.
pub fn is_valid_tolerance(tolerance: &Tolerance) -> bool {
    let value = tolerance_value(tolerance);
    value.is_finite() && value > 0.0
}

/// Model-wide scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Fragment mass tolerance used for peak lookup during scoring
    pub mme: Tolerance,
    pub num_segments: usize,
    pub apply_deconvolution: bool,
    /// Tolerance between isotope peaks in Dalton
    pub deconvolution_tolerance: f64,
    pub support_edge_scores: bool,
    /// Used for spectra that do not carry their own activation method
    pub activation_method: ActivationMethod,
}

impl Configuration {
    pub fn new(
        mme: Tolerance,
        num_segments: usize,
        apply_deconvolution: bool,
        deconvolution_tolerance: f64,
        support_edge_scores: bool,
        activation_method: ActivationMethod,
    ) -> Self {
        Self {
            mme,
            num_segments,
            apply_deconvolution,
            deconvolution_tolerance,
            support_edge_scores,
            activation_method,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(
            Tolerance::Da(0.5),
            1,
            false,
            0.02,
            true,
            ActivationMethod::CID,
        )
    }
}
