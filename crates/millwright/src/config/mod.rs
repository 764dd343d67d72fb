//! Pipeline file parsing and orchestrator settings

mod pipeline;
mod settings;

pub use pipeline::*;
pub use settings::*;
