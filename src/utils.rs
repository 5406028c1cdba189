use rustyms::Element::{H as Hydrogen, O as Oxygen};

/// Fallback monoisotopic masses, used when the element table has no entry
const HYDROGEN_MASS: f64 = 1.007_825_032;
const OXYGEN_MASS: f64 = 15.994_914_620;
const ELECTRON_MASS: f64 = 0.000_548_579_909;

/// Mass difference between the 13C and 12C isotopes.
pub const ISOTOPE_SPACING: f64 = 1.003_354_84;

/// Monoisotopic mass of the charge carrier (a proton).
pub fn proton_mass() -> f64 {
    hydrogen_mass() - ELECTRON_MASS
}

pub fn hydrogen_mass() -> f64 {
    Hydrogen
        .mass(None)
        .map_or(HYDROGEN_MASS, |mass| mass.value)
}

/// Monoisotopic mass of water
pub fn water_mass() -> f64 {
    let oxygen = Oxygen.mass(None).map_or(OXYGEN_MASS, |mass| mass.value);
    2.0 * hydrogen_mass() + oxygen
}

/// Converts mass to charge ration (Thompson) as Dalton
///
/// # Arguments
/// * `mz` - Mass to charge ratio (Thompson)
/// * `charge` - Charge
///
pub fn mass_to_charge_to_dalton(mz: f64, charge: u8) -> f64 {
    let charge = charge as f64;
    (mz - proton_mass()) * charge
}

/// Relative error of `observed` against `theoretical` in parts per million.
pub fn ppm_error(observed: f64, theoretical: f64) -> f64 {
    (observed - theoretical) / theoretical * 1e6
}

/// Integerizes a score, rounding halves towards positive infinity.
///
/// Scores are summed by the downstream dynamic programming as integers, so the
/// rounding rule has to be the same on every platform and for every sign.
pub fn round_score(score: f32) -> i32 {
    (score + 0.5).floor() as i32
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use mzpeaks::CentroidPeak;

    use crate::configuration::{ActivationMethod, Configuration, Tolerance};
    use crate::ion_type::IonType;
    use crate::model::PrecursorOffsetFrequency;
    use crate::rank_model::{ErrorDistribution, PartitionTables, RankModel, RankModelBuilder};
    use crate::spectrum::Spectrum;

    pub const SCENARIO_MATCH_SCORE: f32 = 3.0;
    pub const SCENARIO_MISSING_SCORE: f32 = -1.5;

    #[test]
    fn test_mass_to_charge_ratio_to_dalton() {
        let mass = mass_to_charge_to_dalton(501.257275, 2);
        assert!((mass - 1000.5).abs() < 1e-3, "{mass}");
    }

    #[test]
    fn test_constants() {
        assert!((proton_mass() - 1.007276).abs() < 1e-5);
        assert!((water_mass() - 18.010565).abs() < 1e-5);
    }

    #[test]
    fn test_ppm_error() {
        assert!((ppm_error(1000.01, 1000.0) - 10.0).abs() < 1e-6);
        assert!(ppm_error(999.99, 1000.0) < 0.0);
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(2.5), 3);
        assert_eq!(round_score(-2.5), -2);
        assert_eq!(round_score(-2.6), -3);
        assert_eq!(round_score(0.49), 0);
    }

    /// Prefix ion of charge 1 with the offset used in the single peak scenario.
    pub fn scenario_ion() -> IonType {
        IonType::prefix("b", 1, 1.007825)
    }

    /// Partition tables with one prefix and one suffix ion, both scored by rank.
    pub fn scenario_tables() -> PartitionTables {
        PartitionTables::new(
            vec![scenario_ion(), IonType::suffix("y", 1, 19.01784)],
            vec![
                vec![SCENARIO_MATCH_SCORE, 2.0, 1.0],
                vec![2.5, 1.5, 0.5],
            ],
            vec![SCENARIO_MISSING_SCORE, -1.0],
            0,
            [0.4, 0.2, 0.2, 0.2],
            ErrorDistribution::new(0.01, vec![-2.0, -1.0, 0.5, -1.0, -2.0]),
        )
    }

    /// Model with a single segment and a single parent mass bucket for charges 1 to 3.
    pub fn scenario_model(configuration: Configuration) -> RankModel {
        let mut builder = RankModelBuilder::new(configuration);
        for charge in 1..=3 {
            builder = builder.partition(charge, 0.0, 0, scenario_tables());
        }
        builder.build().unwrap()
    }

    pub fn scenario_configuration() -> Configuration {
        Configuration::new(
            Tolerance::Da(0.05),
            1,
            false,
            0.02,
            true,
            ActivationMethod::CID,
        )
    }

    /// Charge 2 spectrum with parent mass 1000.5 and the given peaks.
    pub fn scenario_spectrum(peaks: &[(f64, f32)]) -> Spectrum {
        let precursor_mz = 1000.5 / 2.0 + proton_mass();
        Spectrum::new(
            peaks
                .iter()
                .map(|&(mz, intensity)| CentroidPeak::new(mz, intensity, 0))
                .collect(),
            CentroidPeak::new(precursor_mz, 1.0, 0),
            2,
            7,
        )
    }

    /// Model with precursor filtering entries registered for charge 2.
    pub fn filtering_model() -> RankModel {
        let mut builder = RankModelBuilder::new(scenario_configuration())
            .precursor_offset(2, PrecursorOffsetFrequency::new(1, 0.0, 0.3))
            .precursor_offset(2, PrecursorOffsetFrequency::new(2, proton_mass(), 0.8));
        for charge in 1..=3 {
            builder = builder.partition(charge, 0.0, 0, scenario_tables());
        }
        builder.build().unwrap()
    }
}
