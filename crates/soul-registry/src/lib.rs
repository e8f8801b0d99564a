//! Persistent registry of genes: content-addressed storage, equivalence
//! groups, champion selection, organisms and attestations.

pub mod database;
pub mod cas;
pub mod model;
pub mod equivalence;
pub mod registry;

pub use cas::ContentStore;
pub use database::Database;
pub use equivalence::EquivalenceGraph;
pub use model::*;
pub use registry::{Registration, Registry};
