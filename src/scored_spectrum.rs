use mzpeaks::CentroidPeak;
use tracing::trace;

use crate::{
    configuration::{is_valid_tolerance, ActivationMethod, Tolerance},
    error::Error,
    ion_type::{IonOrientation, IonType},
    model::ScoringModel,
    node::Node,
    partition::Partition,
    preprocessing::{background_peak_probability, preprocess},
    scoring_result::{MassErrorMatch, NodeEvidence},
    spectrum::Spectrum,
    utils::{ppm_error, round_score},
};

/// Encodes which of two adjacent nodes have peak evidence.
/// Bit 0 is the current node, bit 1 the previous node.
pub fn ion_existence_index(cur_node_observed: bool, prev_node_observed: bool) -> usize {
    (cur_node_observed as usize) | ((prev_node_observed as usize) << 1)
}

/// A preprocessed spectrum bound to a scoring model.
///
/// Built once per spectrum and immutable afterwards; every query is a pure lookup, so a
/// `ScoredSpectrum` can be shared between threads as long as the model can.
pub struct ScoredSpectrum<'a, M: ScoringModel + ?Sized> {
    model: &'a M,
    spectrum: Spectrum,
    mme: Tolerance,
    charge: u8,
    parent_mass: f64,
    precursor: CentroidPeak,
    scan_numbers: Vec<u32>,
    activation_methods: Vec<ActivationMethod>,
    /// Ion types per segment
    ion_types: Vec<&'a [IonType]>,
    /// Partition of the last segment, used for edge scores
    partition: Partition,
    main_ion: &'a IonType,
    prob_peak: f32,
}

impl<'a, M: ScoringModel + ?Sized> ScoredSpectrum<'a, M> {
    /// Creates a new scored spectrum.
    ///
    /// # Arguments
    /// * `spectrum` - The raw spectrum. It is preprocessed and owned afterwards.
    /// * `model` - The scoring model.
    ///
    pub fn new(spectrum: Spectrum, model: &'a M) -> Result<ScoredSpectrum<'a, M>, Error> {
        let charge = spectrum.charge();
        if charge == 0 {
            return Err(Error::NoChargeProvided(spectrum.scan_num()));
        }
        let precursor_mz = spectrum.precursor().mz;
        if !precursor_mz.is_finite() || precursor_mz <= 0.0 {
            return Err(Error::InvalidPrecursor(precursor_mz, spectrum.scan_num()));
        }
        let num_segments = model.num_segments();
        if num_segments == 0 {
            return Err(Error::InvalidModel("zero segments".to_string()));
        }
        let mme = model.mme();
        if !is_valid_tolerance(&mme) {
            return Err(Error::InvalidModel(format!("fragment tolerance {mme:?}")));
        }

        let parent_mass = spectrum.precursor_mass();
        let precursor = spectrum.precursor().clone();
        let activation_method = spectrum
            .activation_method()
            .unwrap_or_else(|| model.default_activation_method());
        let scan_num = spectrum.scan_num();

        let ion_types = (0..num_segments)
            .map(|seg_num| model.ion_types(charge, parent_mass, seg_num))
            .collect();

        let spectrum = preprocess(spectrum, model);

        let partition = model.partition(charge, parent_mass, num_segments - 1);
        let main_ion = model.main_ion_type(&partition);
        let prob_peak = background_peak_probability(&spectrum, mme);

        trace!(
            "Scan {scan_num}: charge {charge}, parent mass {parent_mass:.4}, {} peaks, prob_peak {prob_peak:.4e}, main ion {}",
            spectrum.len(),
            main_ion.name
        );

        Ok(ScoredSpectrum {
            model,
            spectrum,
            mme,
            charge,
            parent_mass,
            precursor,
            scan_numbers: vec![scan_num],
            activation_methods: vec![activation_method],
            ion_types,
            partition,
            main_ion,
            prob_peak,
        })
    }

    pub fn model(&self) -> &'a M {
        self.model
    }

    /// The spectrum after preprocessing.
    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    pub fn charge(&self) -> u8 {
        self.charge
    }

    pub fn parent_mass(&self) -> f64 {
        self.parent_mass
    }

    pub fn precursor_peak(&self) -> &CentroidPeak {
        &self.precursor
    }

    pub fn scan_numbers(&self) -> &[u32] {
        &self.scan_numbers
    }

    pub fn activation_methods(&self) -> &[ActivationMethod] {
        &self.activation_methods
    }

    /// Partition of the last segment. Its charge is the model's, which differs from
    /// [`ScoredSpectrum::charge`] when the model clamps the charge to its trained range.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn main_ion(&self) -> &'a IonType {
        self.main_ion
    }

    /// True if the main ion is a prefix ion.
    pub fn main_ion_direction(&self) -> bool {
        self.main_ion.is_prefix()
    }

    pub fn prob_peak(&self) -> f32 {
        self.prob_peak
    }

    pub fn ion_types(&self, seg_num: usize) -> &'a [IonType] {
        self.ion_types[seg_num]
    }

    /// Ions of the given orientation whose theoretical m/z for `residue_mass` falls into
    /// the segment they are registered for. Yields the segment, the ion and its m/z.
    fn candidate_ions(
        &self,
        residue_mass: f64,
        is_prefix: bool,
    ) -> impl Iterator<Item = (usize, &'a IonType, f64)> + '_ {
        let orientation = IonOrientation::from_is_prefix(is_prefix);
        let num_segments = self.ion_types.len();
        self.ion_types
            .iter()
            .enumerate()
            .flat_map(|(seg_index, &ions)| ions.iter().map(move |ion| (seg_index, ion)))
            .filter(move |(_, ion)| ion.orientation == orientation)
            .filter_map(move |(seg_index, ion)| {
                let theo_mz = ion.mz(residue_mass);
                let seg_num = self.model.segment_num(theo_mz, self.parent_mass);
                assert!(
                    seg_num < num_segments,
                    "model returned segment {seg_num} of {num_segments}"
                );
                (seg_num == seg_index).then_some((seg_num, ion, theo_mz))
            })
    }

    /// Sums the evidence of all ions of one fragment.
    ///
    /// # Arguments
    /// * `node_mass` - Residue mass of the prefix or suffix fragment.
    /// * `is_prefix` - Whether the fragment is N-terminal.
    ///
    pub fn node_score(&self, node_mass: f64, is_prefix: bool) -> f32 {
        self.candidate_ions(node_mass, is_prefix)
            .map(|(seg_num, ion, theo_mz)| {
                let partition = self.model.partition(self.charge, self.parent_mass, seg_num);
                match self.spectrum.peak_by_mass(theo_mz, self.mme) {
                    Some(peak) => {
                        self.model
                            .node_score(&partition, ion, self.spectrum.rank(peak))
                    }
                    None => self.model.missing_ion_score(&partition, ion),
                }
            })
            .sum()
    }

    pub fn node_score_of<N: Node>(&self, node: &N, is_prefix: bool) -> f32 {
        self.node_score(node.mass(), is_prefix)
    }

    /// Integer score of a cleavage seen from both sides.
    ///
    /// # Arguments
    /// * `prm` - Prefix residue mass node.
    /// * `srm` - Suffix residue mass node of the same cleavage.
    ///
    pub fn node_score_pair<N: Node>(&self, prm: &N, srm: &N) -> i32 {
        let prefix_score = self.node_score(prm.mass(), true);
        let suffix_score = self.node_score(srm.mass(), false);
        round_score(prefix_score + suffix_score)
    }

    /// Residue mass of a node corrected by the peak of the main ion.
    ///
    /// Returns `Some(0.0)` for a graph terminus and `None` if the main ion is not observed.
    pub fn node_mass<N: Node>(&self, node: &N) -> Option<f64> {
        if node.nominal_mass() == 0 {
            return Some(0.0);
        }
        let theo_mz = self.main_ion.mz(node.mass());
        self.spectrum
            .peak_by_mass(theo_mz, self.mme)
            .map(|peak| self.main_ion.mass(peak.mz))
    }

    /// Integer score of the edge from `prev_node` to `cur_node`.
    ///
    /// If both nodes are observed, the Dalton deviation of the corrected residue mass from
    /// `theo_mass` is scored as well.
    ///
    /// # Arguments
    /// * `cur_node` - Node the edge leads to.
    /// * `prev_node` - Node the edge starts from.
    /// * `theo_mass` - Theoretical mass of the residue spanned by the edge.
    ///
    pub fn edge_score<N: Node>(&self, cur_node: &N, prev_node: &N, theo_mass: f64) -> i32 {
        if !self.model.supports_edge_scores() {
            return 0;
        }

        let cur_node_mass = self.node_mass(cur_node);
        let prev_node_mass = self.node_mass(prev_node);
        let index = ion_existence_index(cur_node_mass.is_some(), prev_node_mass.is_some());

        let mut edge_score =
            self.model
                .ion_existence_score(&self.partition, index, self.prob_peak);
        if let (Some(cur), Some(prev)) = (cur_node_mass, prev_node_mass) {
            edge_score += self
                .model
                .error_score(&self.partition, cur - prev - theo_mass);
        }
        round_score(edge_score)
    }

    /// Total intensity of the peaks explained by the ions of one fragment.
    ///
    /// # Arguments
    /// * `residue_mass` - Residue mass of the fragment.
    /// * `is_prefix` - Whether the fragment is N-terminal.
    /// * `fragment_tolerance` - Tolerance used instead of the model's.
    ///
    pub fn explained_ion_current(
        &self,
        residue_mass: f64,
        is_prefix: bool,
        fragment_tolerance: Tolerance,
    ) -> f32 {
        self.candidate_ions(residue_mass, is_prefix)
            .filter_map(|(_, _, theo_mz)| self.spectrum.peak_by_mass(theo_mz, fragment_tolerance))
            .map(|peak| peak.intensity)
            .sum()
    }

    /// PPM error of the most intense peak matched by a singly charged ion of the fragment.
    /// On equal intensity the first matching ion in segment and model order wins.
    pub fn mass_error_with_intensity(
        &self,
        residue_mass: f64,
        is_prefix: bool,
        fragment_tolerance: Tolerance,
    ) -> Option<MassErrorMatch> {
        let mut best: Option<MassErrorMatch> = None;
        for (_, ion, theo_mz) in self.candidate_ions(residue_mass, is_prefix) {
            if ion.charge != 1 {
                continue;
            }
            let Some(peak) = self.spectrum.peak_by_mass(theo_mz, fragment_tolerance) else {
                continue;
            };
            if best.is_none_or(|b| peak.intensity > b.intensity) {
                best = Some(MassErrorMatch {
                    ppm_error: ppm_error(peak.mz, theo_mz),
                    intensity: peak.intensity,
                });
            }
        }
        best
    }

    /// Node score together with the mass implied by the best positively scoring singly
    /// charged ion. On equal score the first ion in segment and model order wins.
    pub fn node_mass_and_score(&self, residue_mass: f64, is_prefix: bool) -> NodeEvidence {
        let mut corrected_mass = None;
        let mut best_score = 0.0;
        let mut score = 0.0;
        for (seg_num, ion, theo_mz) in self.candidate_ions(residue_mass, is_prefix) {
            let partition = self.model.partition(self.charge, self.parent_mass, seg_num);
            match self.spectrum.peak_by_mass(theo_mz, self.mme) {
                Some(peak) => {
                    let ion_score =
                        self.model
                            .node_score(&partition, ion, self.spectrum.rank(peak));
                    if ion.charge == 1 && ion_score > best_score {
                        corrected_mass = Some(ion.mass(peak.mz));
                        best_score = ion_score;
                    }
                    score += ion_score;
                }
                None => score += self.model.missing_ion_score(&partition, ion),
            }
        }
        NodeEvidence {
            corrected_mass,
            score,
        }
    }
}
