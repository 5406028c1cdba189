use serde::{Deserialize, Serialize};

/// Statistical bucket of a scoring model.
///
/// A partition is identified by the precursor charge, the mass segment and the lower
/// bound of the parent mass range it was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub charge: u8,
    pub seg_num: usize,
    pub parent_mass: f64,
}

impl Partition {
    pub fn new(charge: u8, seg_num: usize, parent_mass: f64) -> Self {
        Self {
            charge,
            seg_num,
            parent_mass,
        }
    }
}
