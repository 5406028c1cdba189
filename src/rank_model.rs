use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    configuration::{is_valid_tolerance, Configuration},
    error::Error,
    ion_type::IonType,
    model::{PrecursorOffsetFrequency, ScoringModel},
    partition::Partition,
};

/// Lower clamp of the background peak probability used for existence scores.
const MIN_PROB_PEAK: f64 = 1e-6;

/// Histogram of scores over the residue mass error, centered at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDistribution {
    /// Bin width in Dalton
    pub bin_width: f64,
    pub scores: Vec<f32>,
}

impl ErrorDistribution {
    pub fn new(bin_width: f64, scores: Vec<f32>) -> Self {
        Self { bin_width, scores }
    }

    /// Errors outside the histogram fall into the outermost bins.
    pub fn score(&self, error: f64) -> f32 {
        if self.scores.is_empty() || self.bin_width <= 0.0 || !error.is_finite() {
            return 0.0;
        }
        let center = (self.scores.len() / 2) as i64;
        let index = (error / self.bin_width).round() as i64 + center;
        let index = index.clamp(0, self.scores.len() as i64 - 1) as usize;
        self.scores[index]
    }
}

/// Score tables of a single partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionTables {
    pub ion_types: Vec<IonType>,
    /// Per ion type, the score of a matching peak by rank (index 0 is rank 1)
    pub rank_scores: Vec<Vec<f32>>,
    pub missing_ion_scores: Vec<f32>,
    /// Index into `ion_types`
    pub main_ion: usize,
    /// Observed frequency of each ion existence pattern
    pub ion_existence: [f32; 4],
    pub error_distribution: ErrorDistribution,
}

impl PartitionTables {
    pub fn new(
        ion_types: Vec<IonType>,
        rank_scores: Vec<Vec<f32>>,
        missing_ion_scores: Vec<f32>,
        main_ion: usize,
        ion_existence: [f32; 4],
        error_distribution: ErrorDistribution,
    ) -> Self {
        Self {
            ion_types,
            rank_scores,
            missing_ion_scores,
            main_ion,
            ion_existence,
            error_distribution,
        }
    }

    fn ion_index(&self, ion: &IonType) -> usize {
        self.ion_types
            .iter()
            .position(|candidate| candidate == ion)
            .unwrap_or_else(|| panic!("ion type {} is not scored in this partition", ion.name))
    }

    fn validate(&self) -> Result<(), String> {
        if self.ion_types.is_empty() {
            return Err("partition without ion types".to_string());
        }
        if self.rank_scores.len() != self.ion_types.len() {
            return Err(format!(
                "{} rank score tables for {} ion types",
                self.rank_scores.len(),
                self.ion_types.len()
            ));
        }
        if self.missing_ion_scores.len() != self.ion_types.len() {
            return Err(format!(
                "{} missing ion scores for {} ion types",
                self.missing_ion_scores.len(),
                self.ion_types.len()
            ));
        }
        if self.main_ion >= self.ion_types.len() {
            return Err(format!("main ion index {} out of range", self.main_ion));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ParentMassBucket {
    parent_mass: f64,
    segments: Vec<PartitionTables>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ChargeTables {
    charge: u8,
    buckets: Vec<ParentMassBucket>,
}

/// Rank based scoring model backed by pretrained tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankModel {
    configuration: Configuration,
    /// Ascending boundaries of `theo_mz / parent_mass` between consecutive segments
    segment_bounds: Vec<f64>,
    charges: Vec<ChargeTables>,
    precursor_offsets: BTreeMap<u8, Vec<PrecursorOffsetFrequency>>,
}

impl RankModel {
    /// Reads a pretrained model from JSON.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let model: RankModel = serde_json::from_reader(reader)?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_json_reader(BufReader::new(File::open(path)?))
    }

    pub fn to_json_string(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn segment_bounds(&self) -> &[f64] {
        &self.segment_bounds
    }

    /// Charges with trained tables, ascending.
    pub fn charges(&self) -> impl Iterator<Item = u8> + '_ {
        self.charges.iter().map(|tables| tables.charge)
    }

    fn validate(&self) -> Result<(), Error> {
        if !is_valid_tolerance(&self.configuration.mme) {
            return Err(Error::InvalidModel(format!(
                "fragment tolerance {:?} is not positive",
                self.configuration.mme
            )));
        }
        let deconvolution_tolerance = self.configuration.deconvolution_tolerance;
        if !(deconvolution_tolerance.is_finite() && deconvolution_tolerance > 0.0) {
            return Err(Error::InvalidModel(format!(
                "deconvolution tolerance {deconvolution_tolerance} is not positive"
            )));
        }
        let num_segments = self.configuration.num_segments;
        if num_segments == 0 {
            return Err(Error::InvalidModel("zero segments".to_string()));
        }
        if self.segment_bounds.len() != num_segments - 1 {
            return Err(Error::InvalidModel(format!(
                "{} segment bounds for {} segments",
                self.segment_bounds.len(),
                num_segments
            )));
        }
        if self.segment_bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidModel(
                "segment bounds are not ascending".to_string(),
            ));
        }
        if self.charges.is_empty() {
            return Err(Error::InvalidModel("no partitions".to_string()));
        }
        if self.charges.windows(2).any(|w| w[0].charge >= w[1].charge) {
            return Err(Error::InvalidModel("charges are not ascending".to_string()));
        }
        for charge_tables in &self.charges {
            if charge_tables.buckets.is_empty() {
                return Err(Error::InvalidModel(format!(
                    "no parent mass bucket for charge {}",
                    charge_tables.charge
                )));
            }
            if charge_tables
                .buckets
                .windows(2)
                .any(|w| w[0].parent_mass >= w[1].parent_mass)
            {
                return Err(Error::InvalidModel(format!(
                    "parent mass buckets of charge {} are not ascending",
                    charge_tables.charge
                )));
            }
            for bucket in &charge_tables.buckets {
                if bucket.segments.len() != num_segments {
                    return Err(Error::InvalidModel(format!(
                        "charge {} parent mass {} has {} of {} segments",
                        charge_tables.charge,
                        bucket.parent_mass,
                        bucket.segments.len(),
                        num_segments
                    )));
                }
                for (seg_num, tables) in bucket.segments.iter().enumerate() {
                    tables.validate().map_err(|reason| {
                        Error::InvalidModel(format!(
                            "charge {} parent mass {} segment {}: {}",
                            charge_tables.charge, bucket.parent_mass, seg_num, reason
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }

    fn charge_tables(&self, charge: u8) -> &ChargeTables {
        // Spectra outside the trained charge range use the closest trained charge
        let index = self.charges.partition_point(|tables| tables.charge < charge);
        &self.charges[index.min(self.charges.len() - 1)]
    }

    fn bucket_index(charge_tables: &ChargeTables, parent_mass: f64) -> usize {
        charge_tables
            .buckets
            .partition_point(|bucket| bucket.parent_mass <= parent_mass)
            .saturating_sub(1)
    }

    fn tables(&self, partition: &Partition) -> &PartitionTables {
        let charge_tables = self
            .charges
            .iter()
            .find(|tables| tables.charge == partition.charge)
            .unwrap_or_else(|| panic!("no tables for charge {}", partition.charge));
        let bucket = charge_tables
            .buckets
            .iter()
            .find(|bucket| bucket.parent_mass == partition.parent_mass)
            .unwrap_or_else(|| {
                panic!(
                    "no tables for charge {} parent mass {}",
                    partition.charge, partition.parent_mass
                )
            });
        &bucket.segments[partition.seg_num]
    }

    fn tables_for(&self, charge: u8, parent_mass: f64, seg_num: usize) -> &PartitionTables {
        let charge_tables = self.charge_tables(charge);
        let bucket = &charge_tables.buckets[Self::bucket_index(charge_tables, parent_mass)];
        &bucket.segments[seg_num]
    }
}

impl ScoringModel for RankModel {
    fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn segment_num(&self, theo_mz: f64, parent_mass: f64) -> usize {
        if parent_mass <= 0.0 {
            return 0;
        }
        let ratio = theo_mz / parent_mass;
        self.segment_bounds
            .iter()
            .take_while(|&&bound| ratio >= bound)
            .count()
            .min(self.configuration.num_segments - 1)
    }

    fn ion_types(&self, charge: u8, parent_mass: f64, seg_num: usize) -> &[IonType] {
        &self.tables_for(charge, parent_mass, seg_num).ion_types
    }

    fn partition(&self, charge: u8, parent_mass: f64, seg_num: usize) -> Partition {
        assert!(
            seg_num < self.configuration.num_segments,
            "segment {seg_num} out of range"
        );
        let charge_tables = self.charge_tables(charge);
        let bucket = &charge_tables.buckets[Self::bucket_index(charge_tables, parent_mass)];
        Partition::new(charge_tables.charge, seg_num, bucket.parent_mass)
    }

    fn main_ion_type(&self, partition: &Partition) -> &IonType {
        let tables = self.tables(partition);
        &tables.ion_types[tables.main_ion]
    }

    fn node_score(&self, partition: &Partition, ion: &IonType, rank: usize) -> f32 {
        let tables = self.tables(partition);
        let scores = &tables.rank_scores[tables.ion_index(ion)];
        if scores.is_empty() {
            return 0.0;
        }
        // Ranks beyond the table share the score of the last tabulated rank
        scores[rank.saturating_sub(1).min(scores.len() - 1)]
    }

    fn missing_ion_score(&self, partition: &Partition, ion: &IonType) -> f32 {
        let tables = self.tables(partition);
        tables.missing_ion_scores[tables.ion_index(ion)]
    }

    fn ion_existence_score(&self, partition: &Partition, pattern: usize, prob_peak: f32) -> f32 {
        assert!(pattern < 4, "invalid ion existence pattern {pattern}");
        let tables = self.tables(partition);
        let p = (prob_peak as f64).clamp(MIN_PROB_PEAK, 1.0 - MIN_PROB_PEAK);
        let background = match pattern {
            0 => (1.0 - p) * (1.0 - p),
            3 => p * p,
            _ => p * (1.0 - p),
        };
        let frequency = (tables.ion_existence[pattern] as f64).max(f64::MIN_POSITIVE);
        (frequency / background).ln() as f32
    }

    fn error_score(&self, partition: &Partition, error: f64) -> f32 {
        self.tables(partition).error_distribution.score(error)
    }

    fn precursor_offsets(&self, charge: u8) -> &[PrecursorOffsetFrequency] {
        self.precursor_offsets
            .get(&charge)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Programmatic construction of a [`RankModel`].
pub struct RankModelBuilder {
    configuration: Configuration,
    segment_bounds: Option<Vec<f64>>,
    partitions: Vec<(u8, f64, usize, PartitionTables)>,
    precursor_offsets: BTreeMap<u8, Vec<PrecursorOffsetFrequency>>,
}

impl RankModelBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            segment_bounds: None,
            partitions: Vec::new(),
            precursor_offsets: BTreeMap::new(),
        }
    }

    /// Boundaries between segments. Defaults to equally wide segments over `[0, 1)`.
    pub fn segment_bounds(mut self, bounds: Vec<f64>) -> Self {
        self.segment_bounds = Some(bounds);
        self
    }

    /// Adds the tables of one partition. `parent_mass` is the lower bound of its bucket.
    pub fn partition(
        mut self,
        charge: u8,
        parent_mass: f64,
        seg_num: usize,
        tables: PartitionTables,
    ) -> Self {
        self.partitions.push((charge, parent_mass, seg_num, tables));
        self
    }

    pub fn precursor_offset(mut self, charge: u8, offset: PrecursorOffsetFrequency) -> Self {
        self.precursor_offsets.entry(charge).or_default().push(offset);
        self
    }

    pub fn build(self) -> Result<RankModel, Error> {
        let num_segments = self.configuration.num_segments;
        let segment_bounds = self.segment_bounds.unwrap_or_else(|| {
            (1..num_segments)
                .map(|seg| seg as f64 / num_segments as f64)
                .collect()
        });

        let mut partitions = self.partitions;
        partitions.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.total_cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut charges: Vec<ChargeTables> = Vec::new();
        for (charge, parent_mass, seg_num, tables) in partitions {
            if charges.last().map(|c| c.charge) != Some(charge) {
                charges.push(ChargeTables {
                    charge,
                    buckets: Vec::new(),
                });
            }
            let last_charge = charges.len() - 1;
            let buckets = &mut charges[last_charge].buckets;
            if buckets.last().map(|b| b.parent_mass) != Some(parent_mass) {
                buckets.push(ParentMassBucket {
                    parent_mass,
                    segments: Vec::new(),
                });
            }
            let last_bucket = buckets.len() - 1;
            let bucket = &mut buckets[last_bucket];
            if seg_num != bucket.segments.len() {
                return Err(Error::InvalidModel(format!(
                    "charge {charge} parent mass {parent_mass}: segment {seg_num} is duplicated or follows a gap"
                )));
            }
            bucket.segments.push(tables);
        }

        let model = RankModel {
            configuration: self.configuration,
            segment_bounds,
            charges,
            precursor_offsets: self.precursor_offsets,
        };
        model.validate()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::configuration::Tolerance;
    use crate::utils::tests::{scenario_configuration, scenario_ion, scenario_model, scenario_tables};

    fn two_segment_model() -> RankModel {
        let mut configuration = scenario_configuration();
        configuration.num_segments = 2;
        let mut builder = RankModelBuilder::new(configuration).segment_bounds(vec![0.5]);
        for parent_mass in [0.0, 1500.0] {
            for seg_num in 0..2 {
                builder = builder.partition(2, parent_mass, seg_num, scenario_tables());
            }
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_error_distribution() {
        let dist = ErrorDistribution::new(0.01, vec![-2.0, -1.0, 0.5, -1.0, -2.0]);
        assert_eq!(dist.score(0.0), 0.5);
        assert_eq!(dist.score(0.011), -1.0);
        assert_eq!(dist.score(-0.5), -2.0);
        assert_eq!(dist.score(f64::NAN), 0.0);
        assert_eq!(ErrorDistribution::new(0.01, vec![]).score(0.0), 0.0);
    }

    #[test]
    fn test_partition_selection() {
        let model = two_segment_model();
        assert_eq!(model.partition(2, 1000.0, 1), Partition::new(2, 1, 0.0));
        assert_eq!(model.partition(2, 2000.0, 0), Partition::new(2, 0, 1500.0));
        // Charges outside the trained range are clamped
        assert_eq!(model.partition(4, 1500.0, 0), Partition::new(2, 0, 1500.0));
        assert_eq!(model.partition(1, 10.0, 0), Partition::new(2, 0, 0.0));
    }

    #[test]
    fn test_segment_num() {
        let model = two_segment_model();
        assert_eq!(model.segment_num(200.0, 1000.0), 0);
        assert_eq!(model.segment_num(500.0, 1000.0), 1);
        assert_eq!(model.segment_num(5000.0, 1000.0), 1);
        assert_eq!(model.segment_num(5000.0, 0.0), 0);
    }

    #[test]
    fn test_rank_scores_are_clamped() {
        let model = scenario_model(scenario_configuration());
        let partition = model.partition(2, 1000.5, 0);
        let ion = scenario_ion();
        assert_eq!(model.node_score(&partition, &ion, 1), 3.0);
        assert_eq!(model.node_score(&partition, &ion, 3), 1.0);
        assert_eq!(model.node_score(&partition, &ion, 50), 1.0);
        assert_eq!(model.missing_ion_score(&partition, &ion), -1.5);
        assert_eq!(model.main_ion_type(&partition), &ion);
    }

    #[test]
    #[should_panic]
    fn test_unknown_ion_is_a_contract_violation() {
        let model = scenario_model(scenario_configuration());
        let partition = model.partition(2, 1000.5, 0);
        model.node_score(&partition, &IonType::prefix("a", 1, -26.98), 1);
    }

    #[test]
    fn test_ion_existence_score() {
        let model = scenario_model(scenario_configuration());
        let partition = model.partition(2, 1000.5, 0);
        let p = 0.1_f64;
        let both = model.ion_existence_score(&partition, 3, p as f32);
        assert!((both as f64 - (0.2 / (p * p)).ln()).abs() < 1e-4);
        let none = model.ion_existence_score(&partition, 0, p as f32);
        assert!((none as f64 - (0.4 / ((1.0 - p) * (1.0 - p))).ln()).abs() < 1e-4);
        // Dense spectra must not produce NaN
        assert!(model.ion_existence_score(&partition, 0, 3.0).is_finite());
    }

    #[test]
    fn test_builder_rejects_missing_segment() {
        let mut configuration = scenario_configuration();
        configuration.num_segments = 2;
        let result = RankModelBuilder::new(configuration)
            .partition(2, 0.0, 0, scenario_tables())
            .build();
        assert!(matches!(result, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_builder_rejects_zero_segments() {
        let mut configuration = scenario_configuration();
        configuration.num_segments = 0;
        let result = RankModelBuilder::new(configuration).build();
        assert!(matches!(result, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_builder_rejects_unusable_tolerances() {
        for mme in [
            Tolerance::Da(0.0),
            Tolerance::Da(-0.5),
            Tolerance::Da(f64::NAN),
            Tolerance::PPM(f64::INFINITY),
        ] {
            let mut configuration = scenario_configuration();
            configuration.mme = mme;
            let result = RankModelBuilder::new(configuration)
                .partition(2, 0.0, 0, scenario_tables())
                .build();
            assert!(matches!(result, Err(Error::InvalidModel(_))), "{mme:?}");
        }

        let mut configuration = scenario_configuration();
        configuration.deconvolution_tolerance = 0.0;
        let result = RankModelBuilder::new(configuration)
            .partition(2, 0.0, 0, scenario_tables())
            .build();
        assert!(matches!(result, Err(Error::InvalidModel(_))));

        let mut configuration = scenario_configuration();
        configuration.mme = Tolerance::PPM(20.0);
        assert!(RankModelBuilder::new(configuration)
            .partition(2, 0.0, 0, scenario_tables())
            .build()
            .is_ok());
    }

    #[test]
    fn test_builder_rejects_inconsistent_tables() {
        let mut tables = scenario_tables();
        tables.missing_ion_scores.pop();
        let result = RankModelBuilder::new(scenario_configuration())
            .partition(2, 0.0, 0, tables)
            .build();
        assert!(matches!(result, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_json_model() {
        let model = two_segment_model();
        let json = model.to_json_string().unwrap();
        let loaded = RankModel::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded.charges().collect::<Vec<_>>(), vec![2]);
        assert_eq!(loaded.segment_bounds(), &[0.5]);

        assert!(matches!(
            RankModel::from_json_reader("{\"configuration\":".as_bytes()),
            Err(Error::ModelFormat(_))
        ));
        assert!(matches!(
            RankModel::from_json_path("does/not/exist.json"),
            Err(Error::ModelIo(_))
        ));
    }

    #[test]
    fn test_precursor_offsets() {
        let model = crate::utils::tests::filtering_model();
        assert_eq!(model.precursor_offsets(2).len(), 2);
        assert!(model.precursor_offsets(3).is_empty());
    }
}
