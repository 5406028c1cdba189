/// Scaling applied before rounding a mass to its nominal (integer) mass.
pub const NOMINAL_MASS_RESCALER: f64 = 0.999_497_9;

/// Candidate break point of a peptide sequence graph.
///
/// A node with nominal mass 0 is a graph terminus.
pub trait Node {
    fn nominal_mass(&self) -> i32;

    fn mass(&self) -> f64;
}

impl<T: Node + ?Sized> Node for &T {
    fn nominal_mass(&self) -> i32 {
        (**self).nominal_mass()
    }

    fn mass(&self) -> f64 {
        (**self).mass()
    }
}

/// Plain prefix or suffix residue mass node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassNode {
    nominal_mass: i32,
    mass: f64,
}

impl MassNode {
    pub fn new(nominal_mass: i32, mass: f64) -> Self {
        Self { nominal_mass, mass }
    }

    /// Node whose nominal mass is derived from the accurate mass.
    pub fn from_mass(mass: f64) -> Self {
        Self::new((mass * NOMINAL_MASS_RESCALER).round() as i32, mass)
    }

    /// Graph terminus.
    pub fn terminus() -> Self {
        Self::new(0, 0.0)
    }
}

impl Node for MassNode {
    fn nominal_mass(&self) -> i32 {
        self.nominal_mass
    }

    fn mass(&self) -> f64 {
        self.mass
    }
}
