use serde::{Deserialize, Serialize};

use crate::{
    configuration::{ActivationMethod, Configuration, Tolerance},
    ion_type::IonType,
    partition::Partition,
};

/// Peak commonly observed at a fixed offset from the charge reduced precursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecursorOffsetFrequency {
    pub reduced_charge: u8,
    pub offset: f64,
    pub frequency: f32,
}

impl PrecursorOffsetFrequency {
    pub fn new(reduced_charge: u8, offset: f64, frequency: f32) -> Self {
        Self {
            reduced_charge,
            offset,
            frequency,
        }
    }
}

/// Read-only view on a pretrained statistical scoring model.
///
/// Implementations must be immutable once built, so one model can be shared by all
/// spectra scored concurrently.
pub trait ScoringModel {
    fn configuration(&self) -> &Configuration;

    /// Fragment mass tolerance used for every peak lookup during scoring.
    fn mme(&self) -> Tolerance {
        self.configuration().mme
    }

    fn num_segments(&self) -> usize {
        self.configuration().num_segments
    }

    fn supports_edge_scores(&self) -> bool {
        self.configuration().support_edge_scores
    }

    fn applies_deconvolution(&self) -> bool {
        self.configuration().apply_deconvolution
    }

    fn deconvolution_tolerance(&self) -> f64 {
        self.configuration().deconvolution_tolerance
    }

    fn default_activation_method(&self) -> ActivationMethod {
        self.configuration().activation_method
    }

    /// Segment a theoretical ion m/z belongs to, in `0..num_segments()`.
    fn segment_num(&self, theo_mz: f64, parent_mass: f64) -> usize;

    /// Ion types scored in the given segment.
    fn ion_types(&self, charge: u8, parent_mass: f64, seg_num: usize) -> &[IonType];

    fn partition(&self, charge: u8, parent_mass: f64, seg_num: usize) -> Partition;

    /// Most informative ion type of a partition.
    fn main_ion_type(&self, partition: &Partition) -> &IonType;

    /// Score of an observed ion at the given 1-based intensity rank.
    fn node_score(&self, partition: &Partition, ion: &IonType, rank: usize) -> f32;

    /// Score of an ion that has no matching peak.
    fn missing_ion_score(&self, partition: &Partition, ion: &IonType) -> f32;

    /// Score of an ion existence pattern of two adjacent nodes given the background
    /// peak probability. Bit 0 is set when the current node has evidence, bit 1 when
    /// the previous node has.
    fn ion_existence_score(&self, partition: &Partition, pattern: usize, prob_peak: f32) -> f32;

    /// Score of the deviation between an observed and a theoretical residue mass, in Dalton.
    fn error_score(&self, partition: &Partition, error: f64) -> f32;

    /// Precursor related peaks to remove from spectra of the given charge.
    fn precursor_offsets(&self, charge: u8) -> &[PrecursorOffsetFrequency];
}
