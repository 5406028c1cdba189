pub mod configuration;
pub mod error;
pub mod ion_type;
pub mod model;
pub mod node;
pub mod partition;
pub mod preprocessing;
pub mod rank_model;
/// Per spectrum scoring context
pub mod scored_spectrum;
pub mod scoring_result;
pub mod spectrum;
// Chemical constants and numeric helpers
pub mod utils;
