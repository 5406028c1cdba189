/// Mass error of the most intense singly charged ion matching a fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassErrorMatch {
    pub ppm_error: f64,
    pub intensity: f32,
}

/// Summed score of all ions of a fragment, with the mass implied by its best scoring
/// singly charged ion, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeEvidence {
    pub corrected_mass: Option<f64>,
    pub score: f32,
}
