use mzpeaks::{prelude::*, CentroidPeak, IndexType, MZPeakSetType, Tolerance};
use ndarray::Array1;

use crate::{
    configuration::ActivationMethod,
    error::Error,
    utils::{mass_to_charge_to_dalton, proton_mass, water_mass, ISOTOPE_SPACING},
};

/// Maximum number of isotope peaks followed after the monoisotopic peak during deconvolution.
const MAX_ISOTOPES: usize = 4;

/// Sorts peaks by m/z and indexes them by position.
fn peak_set(mut peaks: Vec<CentroidPeak>) -> MZPeakSetType<CentroidPeak> {
    peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    for (index, peak) in peaks.iter_mut().enumerate() {
        peak.index = index as IndexType;
    }
    MZPeakSetType::new(peaks)
}

/// Centroided MS/MS spectrum of one precursor, with an intensity rank per peak.
#[derive(Debug, Clone)]
pub struct Spectrum {
    peaks: MZPeakSetType<CentroidPeak>,
    /// 1-based intensity rank by peak index
    ranks: Vec<usize>,
    precursor: CentroidPeak,
    charge: u8,
    scan_num: u32,
    activation_method: Option<ActivationMethod>,
    deconvoluted: bool,
}

impl PartialEq for Spectrum {
    fn eq(&self, other: &Self) -> bool {
        self.charge == other.charge
            && self.scan_num == other.scan_num
            && self.activation_method == other.activation_method
            && self.deconvoluted == other.deconvoluted
            && self.precursor == other.precursor
            && self.ranks == other.ranks
            && self.peaks.iter().eq(other.peaks.iter())
    }
}

impl Spectrum {
    /// Creates a new spectrum. Peaks are sorted by m/z and ranked by intensity.
    ///
    /// # Arguments
    /// * `peaks` - Centroided fragment peaks in any order.
    /// * `precursor` - Precursor peak (m/z and intensity).
    /// * `charge` - Precursor charge, 0 if unknown.
    /// * `scan_num` - Scan number of the spectrum.
    ///
    pub fn new(
        peaks: Vec<CentroidPeak>,
        precursor: CentroidPeak,
        charge: u8,
        scan_num: u32,
    ) -> Self {
        let mut spectrum = Self {
            peaks: peak_set(peaks),
            ranks: Vec::new(),
            precursor,
            charge,
            scan_num,
            activation_method: None,
            deconvoluted: false,
        };
        spectrum.set_ranks_of_peaks();
        spectrum
    }

    /// Creates a new spectrum from m/z and intensity arrays.
    ///
    /// # Arguments
    /// * `mz` - The m/z values of the experimental spectrum.
    /// * `intensities` - The intensity values of the experimental spectrum.
    /// * `precursor` - Precursor peak.
    /// * `charge` - Precursor charge, 0 if unknown.
    /// * `scan_num` - Scan number of the spectrum.
    ///
    pub fn from_arrays(
        mz: &Array1<f64>,
        intensities: &Array1<f32>,
        precursor: CentroidPeak,
        charge: u8,
        scan_num: u32,
    ) -> Result<Self, Error> {
        if mz.len() != intensities.len() {
            return Err(Error::ExperimentalSpectrumShape(
                mz.len(),
                intensities.len(),
            ));
        }

        let peaks = mz
            .iter()
            .zip(intensities.iter())
            .map(|(&mz, &intensity)| CentroidPeak::new(mz, intensity, 0))
            .collect();

        Ok(Self::new(peaks, precursor, charge, scan_num))
    }

    pub fn with_activation_method(mut self, activation_method: ActivationMethod) -> Self {
        self.activation_method = Some(activation_method);
        self
    }

    /// Peaks sorted by m/z.
    pub fn peaks(&self) -> &MZPeakSetType<CentroidPeak> {
        &self.peaks
    }

    /// Intensity rank of a peak of this spectrum, 1 for the most intense peak.
    pub fn rank(&self, peak: &CentroidPeak) -> usize {
        self.ranks.get(peak.index as usize).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.len() == 0
    }

    pub fn precursor(&self) -> &CentroidPeak {
        &self.precursor
    }

    pub fn charge(&self) -> u8 {
        self.charge
    }

    pub fn scan_num(&self) -> u32 {
        self.scan_num
    }

    pub fn activation_method(&self) -> Option<ActivationMethod> {
        self.activation_method
    }

    /// Whether isotope clusters were already collapsed into singly charged peaks.
    pub fn is_deconvoluted(&self) -> bool {
        self.deconvoluted
    }

    /// Neutral mass of the precursor.
    pub fn precursor_mass(&self) -> f64 {
        mass_to_charge_to_dalton(self.precursor.mz, self.charge)
    }

    /// Sum of the residue masses, i.e. the precursor mass without water.
    pub fn peptide_mass(&self) -> f64 {
        self.precursor_mass() - water_mass()
    }

    /// Returns the peak nearest to `mz` within `tolerance`.
    pub fn peak_by_mass(&self, mz: f64, tolerance: Tolerance) -> Option<&CentroidPeak> {
        self.peaks.has_peak(mz, tolerance)
    }

    /// Removes the peaks within `tolerance` of the precursor seen at a reduced charge,
    /// i.e. around `precursor_mass / reduced_charge + offset`.
    ///
    /// Remaining peaks keep their ranks until [`Spectrum::set_ranks_of_peaks`] is called.
    /// Returns the number of removed peaks.
    pub fn filter_precursor_peaks(
        &mut self,
        tolerance: Tolerance,
        reduced_charge: u8,
        offset: f64,
    ) -> usize {
        if reduced_charge == 0 {
            return 0;
        }
        let target = self.precursor_mass() / reduced_charge as f64 + offset;
        let before = self.peaks.len();
        let (peaks, ranks): (Vec<CentroidPeak>, Vec<usize>) = self
            .peaks
            .iter()
            .filter(|peak| !tolerance.test(target, peak.mz))
            .map(|peak| (peak.clone(), self.rank(peak)))
            .unzip();
        let removed = before - peaks.len();
        if removed > 0 {
            self.peaks = peak_set(peaks);
            self.ranks = ranks;
        }
        removed
    }

    /// Assigns 1-based ranks by decreasing intensity. Equal intensities keep m/z order.
    pub fn set_ranks_of_peaks(&mut self) {
        let mut order: Vec<&CentroidPeak> = self.peaks.iter().collect();
        order.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
        let mut ranks = vec![0; order.len()];
        for (rank, peak) in order.into_iter().enumerate() {
            ranks[peak.index as usize] = rank + 1;
        }
        self.ranks = ranks;
    }

    /// Collects the isotope peaks following `mono` for fragment charge `charge`.
    fn isotope_cluster(
        &self,
        mono: usize,
        charge: u8,
        tolerance: Tolerance,
        consumed: &[bool],
    ) -> Vec<usize> {
        let spacing = ISOTOPE_SPACING / charge as f64;
        let mut cluster = Vec::new();
        let mut current_mz = self.peaks[mono].mz;
        for _ in 0..MAX_ISOTOPES {
            let expected = current_mz + spacing;
            let next = self
                .peaks
                .all_peaks_for(expected, tolerance)
                .iter()
                .filter(|peak| {
                    let index = peak.index as usize;
                    index > mono && !consumed[index]
                })
                .min_by(|a, b| (a.mz - expected).abs().total_cmp(&(b.mz - expected).abs()));
            match next {
                Some(peak) => {
                    cluster.push(peak.index as usize);
                    current_mz = peak.mz;
                }
                None => break,
            }
        }
        cluster
    }

    /// Returns a copy of this spectrum where isotope clusters of multiply charged fragments
    /// are collapsed into single peaks at their singly charged m/z.
    ///
    /// The charge of a cluster is searched from the precursor charge down to 2. Intensities
    /// of a cluster are summed, and peaks that end up within `tolerance` of each other after
    /// conversion are merged. Ranks are reassigned on the result. A spectrum that is already
    /// deconvoluted is returned unchanged, since its peaks are singly charged.
    ///
    /// # Arguments
    /// * `tolerance` - Allowed deviation between consecutive isotope peaks in Dalton.
    ///
    pub fn deconvoluted(&self, tolerance: f64) -> Spectrum {
        if self.deconvoluted {
            return self.clone();
        }
        let proton = proton_mass();
        let isotope_tolerance = Tolerance::Da(tolerance);
        let num_peaks = self.peaks.len();
        let mut consumed = vec![false; num_peaks];
        let mut converted: Vec<CentroidPeak> = Vec::with_capacity(num_peaks);

        for mono in 0..num_peaks {
            if consumed[mono] {
                continue;
            }
            consumed[mono] = true;
            let mono_peak = &self.peaks[mono];
            let mut charge = 1;
            let mut intensity = mono_peak.intensity;
            for fragment_charge in (2..=self.charge).rev() {
                let cluster =
                    self.isotope_cluster(mono, fragment_charge, isotope_tolerance, &consumed);
                if cluster.is_empty() {
                    continue;
                }
                for index in cluster {
                    consumed[index] = true;
                    intensity += self.peaks[index].intensity;
                }
                charge = fragment_charge;
                break;
            }
            let mz = match charge {
                1 => mono_peak.mz,
                _ => (mono_peak.mz - proton) * charge as f64 + proton,
            };
            converted.push(CentroidPeak::new(mz, intensity, 0));
        }

        converted.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        let mut peaks: Vec<CentroidPeak> = Vec::with_capacity(converted.len());
        for peak in converted {
            match peaks.last_mut() {
                Some(last) if isotope_tolerance.test(last.mz, peak.mz) => {
                    if peak.intensity > last.intensity {
                        last.mz = peak.mz;
                    }
                    last.intensity += peak.intensity;
                }
                _ => peaks.push(peak),
            }
        }

        let mut spectrum = Spectrum {
            peaks: peak_set(peaks),
            ranks: Vec::new(),
            precursor: self.precursor.clone(),
            charge: self.charge,
            scan_num: self.scan_num,
            activation_method: self.activation_method,
            deconvoluted: true,
        };
        spectrum.set_ranks_of_peaks();
        spectrum
    }
}
