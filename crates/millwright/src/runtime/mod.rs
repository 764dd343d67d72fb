//! Component lifecycle and reconciliation engine

pub mod component;
pub mod graph;
pub mod launcher;
pub mod orchestrator;
pub mod reconciler;

pub use component::*;
pub use graph::*;
pub use launcher::*;
pub use orchestrator::*;
pub use reconciler::*;
