//! Persistence of simulation results.
pub mod export;

pub use export::{DataExporter, DataWriter, FieldEntry, FieldKind, MemoryWriter, StoredLevel};
