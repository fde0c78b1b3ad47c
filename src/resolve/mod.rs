//! Resolution of citation keys against the sources, and merging of the
//! results into a bibliography.

mod engine;
mod merge;

pub use engine::{chain_for, ResolutionEngine};
pub use merge::{
    KeyReport, KeyStatus, MergeCoordinator, MergeObserver, MergeOptions, MergeReport,
};
