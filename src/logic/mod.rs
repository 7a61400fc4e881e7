pub mod analysis;
pub mod conflict_ops;
pub mod detection;
pub mod error;
pub mod group_fanout;
pub mod group_sync;
pub mod pot_detection;
pub mod resolution;
pub mod scope;
pub mod slot_detection;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::*;
pub use conflict_ops::*;
pub use detection::{DetectionOutcome, DetectionSummary};
pub use error::{ArbitrationError, Result};
pub use group_fanout::*;
pub use group_sync::*;
pub use pot_detection::PotConflictDetector;
pub use resolution::{Decision, ResolutionEngine};
pub use scope::ConflictScope;
pub use slot_detection::SlotConflictDetector;
pub use snapshot::CatalogSnapshot;
