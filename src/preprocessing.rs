use tracing::debug;

use crate::{
    configuration::{tolerance_value, Tolerance},
    model::ScoringModel,
    spectrum::Spectrum,
};

/// Prepares a spectrum for scoring.
///
/// Removes the precursor related peaks registered in the model for the spectrum's charge,
/// re-ranks the remaining peaks and, if the model asks for it, deconvolutes the spectrum.
/// Precursor offsets refer to raw fragment m/z values, so a spectrum that is already
/// deconvoluted is returned as is.
///
/// # Arguments
/// * `spectrum` - The raw spectrum, consumed.
/// * `model` - The scoring model providing tolerances and precursor offsets.
///
pub fn preprocess<M: ScoringModel + ?Sized>(mut spectrum: Spectrum, model: &M) -> Spectrum {
    if spectrum.is_deconvoluted() {
        debug!("Scan {}: already deconvoluted", spectrum.scan_num());
        return spectrum;
    }

    let mme = model.mme();
    let removed: usize = model
        .precursor_offsets(spectrum.charge())
        .iter()
        .map(|off| spectrum.filter_precursor_peaks(mme, off.reduced_charge, off.offset))
        .sum();
    debug!(
        "Scan {}: removed {removed} precursor peaks, {} left",
        spectrum.scan_num(),
        spectrum.len()
    );
    spectrum.set_ranks_of_peaks();

    if model.applies_deconvolution() {
        let before = spectrum.len();
        spectrum = spectrum.deconvoluted(model.deconvolution_tolerance());
        debug!(
            "Scan {}: deconvolution merged {} peaks into {}",
            spectrum.scan_num(),
            before,
            spectrum.len()
        );
    }
    spectrum
}

/// Probability that a random mass bin of width `2 * mme` holds a peak.
///
/// Never zero for a strictly positive `mme`, so that existence scores stay finite for
/// empty spectra. Models reject other tolerances when they are built.
pub fn background_peak_probability(spectrum: &Spectrum, mme: Tolerance) -> f32 {
    let approx_num_bins = (spectrum.peptide_mass() / (tolerance_value(&mme) * 2.0)).max(1.0);
    let num_peaks = spectrum.len().max(1);
    (num_peaks as f64 / approx_num_bins) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        configuration::Configuration,
        utils::{
            proton_mass,
            tests::{filtering_model, scenario_configuration, scenario_model, scenario_spectrum},
            ISOTOPE_SPACING,
        },
    };
    use mzpeaks::CentroidPeak;

    #[test_log::test]
    fn test_precursor_peaks_are_removed() {
        let precursor_mz = 1000.5 / 2.0 + proton_mass();
        let spectrum = scenario_spectrum(&[
            (200.0, 5.0),
            (precursor_mz, 100.0),
            (1000.51, 30.0),
            (700.0, 10.0),
        ]);
        let processed = preprocess(spectrum, &filtering_model());
        let mz: Vec<f64> = processed.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mz, vec![200.0, 700.0]);
        let ranks: Vec<usize> = processed.peaks().iter().map(|p| processed.rank(p)).collect();
        assert_eq!(ranks, vec![2, 1]);
    }

    #[test]
    fn test_filtering_is_order_independent() {
        let precursor_mz = 1000.5 / 2.0 + proton_mass();
        let peaks = [(precursor_mz, 100.0), (1000.49, 30.0), (300.0, 1.0)];
        let mut forward = scenario_spectrum(&peaks);
        let mut backward = forward.clone();
        let model = filtering_model();
        let mme = model.mme();
        for off in model.precursor_offsets(2) {
            forward.filter_precursor_peaks(mme, off.reduced_charge, off.offset);
        }
        for off in model.precursor_offsets(2).iter().rev() {
            backward.filter_precursor_peaks(mme, off.reduced_charge, off.offset);
        }
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 1);
    }

    #[test_log::test]
    fn test_deconvolution_follows_filtering() {
        let mut configuration = scenario_configuration();
        configuration.apply_deconvolution = true;
        let model = scenario_model(configuration);
        let spectrum = scenario_spectrum(&[(300.0, 4.0), (300.5017, 2.0), (450.0, 3.0)]);
        let processed = preprocess(spectrum, &model);
        assert_eq!(processed.len(), 2);
        assert_eq!(processed.peaks()[0].mz, 450.0);
        assert_eq!(processed.rank(&processed.peaks()[1]), 1);
    }

    #[test_log::test]
    fn test_deconvoluted_spectrum_is_a_fixed_point() {
        let mut configuration = scenario_configuration();
        configuration.apply_deconvolution = true;
        let model = scenario_model(configuration);
        let proton = proton_mass();
        let converted = (400.0 - proton) * 2.0 + proton;
        let spectrum = scenario_spectrum(&[
            (400.0, 10.0),
            (400.0 + ISOTOPE_SPACING / 2.0, 5.0),
            (converted + ISOTOPE_SPACING / 2.0, 1.0),
        ]);
        let once = preprocess(spectrum, &model);
        assert_eq!(once.len(), 2);
        assert!(once.is_deconvoluted());
        assert_eq!(preprocess(once.clone(), &model), once);
    }

    #[test]
    fn test_deconvoluted_spectrum_is_not_filtered() {
        let precursor_mz = 1000.5 / 2.0 + proton_mass();
        let spectrum = scenario_spectrum(&[(200.0, 1.0), (precursor_mz, 100.0)]).deconvoluted(0.02);
        let processed = preprocess(spectrum.clone(), &filtering_model());
        assert_eq!(processed.len(), 2);
        assert_eq!(processed, spectrum);
    }

    #[test]
    fn test_background_peak_probability() {
        let spectrum = scenario_spectrum(&[(200.0, 1.0), (300.0, 1.0)]);
        let mme = Tolerance::Da(0.5);
        let expected = 2.0 / (spectrum.peptide_mass() / 1.0);
        let prob = background_peak_probability(&spectrum, mme);
        assert!((prob as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_background_peak_probability_of_empty_spectrum() {
        let spectrum = scenario_spectrum(&[]);
        let prob = background_peak_probability(&spectrum, Tolerance::Da(0.5));
        assert!(prob > 0.0 && prob.is_finite());
        assert!((prob as f64 - 1.0 / spectrum.peptide_mass()).abs() < 1e-6);

        let tiny = Spectrum::new(vec![], CentroidPeak::new(5.0, 1.0, 0), 1, 1);
        assert_eq!(background_peak_probability(&tiny, Tolerance::Da(0.5)), 1.0);
    }

    #[test]
    fn test_default_configuration_has_no_offsets() {
        let model = scenario_model(Configuration::default());
        let spectrum = scenario_spectrum(&[(200.0, 1.0)]);
        assert_eq!(preprocess(spectrum.clone(), &model), spectrum);
    }
}
