use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("m/z ({0}) and intensities ({1}) arrays must have the same length")]
    ExperimentalSpectrumShape(usize, usize),
    #[error("No charge provided for spectrum {0}")]
    NoChargeProvided(u32),
    #[error("Invalid precursor m/z {0} for spectrum {1}")]
    InvalidPrecursor(f64, u32),
    #[error("Unknown activation method: {0}")]
    UnknownActivationMethod(String),
    #[error("Invalid scoring model: {0}")]
    InvalidModel(String),
    #[error("Cannot read scoring model: {0}")]
    ModelIo(#[from] std::io::Error),
    #[error("Cannot parse scoring model: {0}")]
    ModelFormat(#[from] serde_json::Error),
}
