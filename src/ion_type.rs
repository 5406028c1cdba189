use serde::{Deserialize, Serialize};

/// Which end of the peptide a fragment ion retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IonOrientation {
    /// N-terminal fragment
    Prefix,
    /// C-terminal fragment
    Suffix,
}

impl IonOrientation {
    pub fn from_is_prefix(is_prefix: bool) -> Self {
        if is_prefix {
            IonOrientation::Prefix
        } else {
            IonOrientation::Suffix
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self, IonOrientation::Prefix)
    }
}

/// Rule mapping a fragment residue mass to the m/z of the peak it produces.
///
/// The offset is expressed per charge, i.e. `mz = residue_mass / charge + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IonType {
    pub name: String,
    pub orientation: IonOrientation,
    pub charge: u8,
    pub offset: f64,
}

impl IonType {
    pub fn new(name: &str, orientation: IonOrientation, charge: u8, offset: f64) -> Self {
        assert!(charge > 0, "ion type {name} must carry a positive charge");
        Self {
            name: name.to_string(),
            orientation,
            charge,
            offset,
        }
    }

    pub fn prefix(name: &str, charge: u8, offset: f64) -> Self {
        Self::new(name, IonOrientation::Prefix, charge, offset)
    }

    pub fn suffix(name: &str, charge: u8, offset: f64) -> Self {
        Self::new(name, IonOrientation::Suffix, charge, offset)
    }

    pub fn is_prefix(&self) -> bool {
        self.orientation.is_prefix()
    }

    /// Theoretical m/z of this ion for a fragment of the given residue mass.
    #[inline]
    pub fn mz(&self, residue_mass: f64) -> f64 {
        residue_mass / self.charge as f64 + self.offset
    }

    /// Residue mass implied by a peak observed at `peak_mz`.
    #[inline]
    pub fn mass(&self, peak_mz: f64) -> f64 {
        (peak_mz - self.offset) * self.charge as f64
    }
}
