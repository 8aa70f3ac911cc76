//! Time-level export of nodal fields and model geometry.
//!
//! A [`DataExporter`] keeps a registry of named fields. At every dump it hands the current
//! field values to each registered [`DataWriter`], which decides how to persist them. The
//! [`MemoryWriter`] keeps everything in memory.
use crate::error::ExportError;
use crate::integrate::TimeDomain;
use crate::model::Model;
use log::{debug, info};
use nalgebra::DVector;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a field holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain vector of values.
    Vector,
    /// Nodal values together with the geometry of the model they live on.
    Model,
}

/// A registered field and its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub name: String,
    pub description: String,
    pub kind: FieldKind,
    pub values: Option<DVector<f64>>,
    /// The patches of the model in g2 format, for [`FieldKind::Model`] fields.
    pub geometry: Option<String>,
}

/// Persistence backend of a [`DataExporter`].
pub trait DataWriter {
    /// The last time level stored by the writer, if any.
    fn last_time_level(&self) -> Option<usize>;

    fn open(&mut self, level: usize) -> eyre::Result<()>;

    fn close(&mut self, level: usize) -> eyre::Result<()>;

    fn write_vector(&mut self, level: usize, entry: &FieldEntry) -> eyre::Result<()>;

    /// Reads the values of a field at a time level, or `None` if they were not stored.
    fn read_vector(&self, level: usize, entry: &FieldEntry) -> eyre::Result<Option<DVector<f64>>>;

    fn write_geometry(&mut self, level: usize, entry: &FieldEntry) -> eyre::Result<()>;

    /// Stores the time parameters of a level, along with the dump interval.
    fn write_time_info(&mut self, level: usize, interval: usize, time: &TimeDomain) -> eyre::Result<()>;
}

/// Writes registered fields to all registered writers at regular intervals.
pub struct DataExporter {
    entries: BTreeMap<String, FieldEntry>,
    writers: Vec<Box<dyn DataWriter>>,
    /// The next level to write, determined from the writers on the first dump.
    next_level: Option<usize>,
    /// Number of levels dumped (or loaded) by this exporter.
    dumped: usize,
    ndump: usize,
    calls: usize,
}

impl std::fmt::Debug for DataExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataExporter")
            .field("entries", &self.entries)
            .field("num_writers", &self.writers.len())
            .field("next_level", &self.next_level)
            .field("ndump", &self.ndump)
            .finish()
    }
}

impl DataExporter {
    /// An exporter that dumps on every `ndump`-th call to
    /// [`dump_time_level`](Self::dump_time_level). An interval of zero is treated as one.
    pub fn new(ndump: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            writers: Vec::new(),
            next_level: None,
            dumped: 0,
            ndump: ndump.max(1),
            calls: 0,
        }
    }

    /// Registers a field. Registering an existing name again replaces the field.
    pub fn register_field(&mut self, name: &str, description: &str, kind: FieldKind) {
        debug!("Registering field \"{name}\"");
        self.entries.insert(
            name.to_string(),
            FieldEntry {
                name: name.to_string(),
                description: description.to_string(),
                kind,
                values: None,
                geometry: None,
            },
        );
    }

    pub fn register_writer(&mut self, writer: Box<dyn DataWriter>) {
        self.writers.push(writer);
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.entries.get(name)
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut FieldEntry, ExportError> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| ExportError::UnknownField(name.to_string()))
    }

    pub fn set_field_value(&mut self, name: &str, values: DVector<f64>) -> Result<(), ExportError> {
        self.entry_mut(name)?.values = Some(values);
        Ok(())
    }

    /// Sets the geometry of a [`FieldKind::Model`] field from the patches of a model.
    pub fn set_field_geometry(&mut self, name: &str, model: &Model) -> Result<(), ExportError> {
        let mut g2 = String::new();
        for patch in model.patches().iter().filter(|patch| patch.geometry().is_some()) {
            g2.push_str(&patch.to_g2()?);
        }
        let entry = self.entry_mut(name)?;
        if entry.kind != FieldKind::Model {
            return Err(ExportError::WrongFieldKind(name.to_string()));
        }
        entry.geometry = Some(g2);
        Ok(())
    }

    /// The last level dumped or loaded, if any.
    pub fn time_level(&self) -> Option<usize> {
        self.next_level.and_then(|level| level.checked_sub(1))
    }

    fn writers_time_level(&self) -> Option<usize> {
        self.writers.iter().filter_map(|writer| writer.last_time_level()).max()
    }

    /// Writes all fields to all writers, unless the dump interval skips this call.
    ///
    /// Geometry is written at the first level dumped by this exporter, and afterwards only when
    /// `geometry_updated` is set. Returns whether a level was written.
    pub fn dump_time_level(&mut self, time: &TimeDomain, geometry_updated: bool) -> Result<bool, ExportError> {
        let call = self.calls;
        self.calls += 1;
        if call % self.ndump != 0 {
            return Ok(false);
        }
        if self.writers.is_empty() {
            return Err(ExportError::NoWriters);
        }
        for entry in self.entries.values() {
            if entry.values.is_none() {
                return Err(ExportError::MissingValue(entry.name.clone()));
            }
        }

        let level = match self.next_level {
            Some(level) => level,
            None => self.writers_time_level().map_or(0, |level| level + 1),
        };
        let write_geometry = self.dumped == 0 || geometry_updated;
        info!("Writing time level {level} (t = {})", time.t);

        for writer in &mut self.writers {
            writer.open(level).map_err(ExportError::Writer)?;
            for entry in self.entries.values() {
                if entry.kind == FieldKind::Model && write_geometry {
                    writer.write_geometry(level, entry).map_err(ExportError::Writer)?;
                }
                writer.write_vector(level, entry).map_err(ExportError::Writer)?;
            }
            writer
                .write_time_info(level, self.ndump, time)
                .map_err(ExportError::Writer)?;
            writer.close(level).map_err(ExportError::Writer)?;
        }

        self.next_level = Some(level + 1);
        self.dumped += 1;
        Ok(true)
    }

    /// Restores the values of all fields from the first writer, at the given level or at the
    /// last level it stored. Subsequent dumps continue after the loaded level.
    pub fn load_time_level(&mut self, level: Option<usize>) -> Result<usize, ExportError> {
        let writer = self.writers.first().ok_or(ExportError::NoWriters)?;
        let level = level
            .or_else(|| writer.last_time_level())
            .ok_or(ExportError::MissingTimeLevel { level: 0 })?;

        let mut loaded = Vec::with_capacity(self.entries.len());
        for (name, entry) in &self.entries {
            let values = writer
                .read_vector(level, entry)
                .map_err(ExportError::Writer)?
                .ok_or(ExportError::MissingTimeLevel { level })?;
            loaded.push((name.clone(), values));
        }
        for (name, values) in loaded {
            self.entry_mut(&name)?.values = Some(values);
        }

        info!("Loaded time level {level}");
        self.next_level = Some(level + 1);
        self.dumped += 1;
        Ok(level)
    }
}

/// The data stored for one time level by a [`MemoryWriter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredLevel {
    pub vectors: BTreeMap<String, DVector<f64>>,
    pub geometry: BTreeMap<String, String>,
    pub time: Option<(TimeDomain, usize)>,
}

#[derive(Debug, Default)]
struct MemoryStorage {
    levels: BTreeMap<usize, StoredLevel>,
    open: Option<usize>,
}

impl MemoryStorage {
    fn open_level(&mut self, level: usize) -> eyre::Result<&mut StoredLevel> {
        if self.open != Some(level) {
            eyre::bail!("time level {level} is not open");
        }
        Ok(self.levels.entry(level).or_default())
    }
}

/// A [`DataWriter`] keeping all time levels in memory.
///
/// Clones share the same storage, so a clone kept aside can inspect what was written through
/// the writer registered with an exporter.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    storage: Arc<Mutex<MemoryStorage>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn storage(&self) -> MutexGuard<'_, MemoryStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn level(&self, level: usize) -> Option<StoredLevel> {
        self.storage().levels.get(&level).cloned()
    }

    pub fn num_levels(&self) -> usize {
        self.storage().levels.len()
    }
}

impl DataWriter for MemoryWriter {
    fn last_time_level(&self) -> Option<usize> {
        self.storage().levels.keys().next_back().copied()
    }

    fn open(&mut self, level: usize) -> eyre::Result<()> {
        let mut storage = self.storage();
        if let Some(open) = storage.open {
            eyre::bail!("cannot open time level {level} while level {open} is open");
        }
        storage.open = Some(level);
        storage.levels.entry(level).or_default();
        Ok(())
    }

    fn close(&mut self, level: usize) -> eyre::Result<()> {
        let mut storage = self.storage();
        if storage.open != Some(level) {
            eyre::bail!("time level {level} is not open");
        }
        storage.open = None;
        Ok(())
    }

    fn write_vector(&mut self, level: usize, entry: &FieldEntry) -> eyre::Result<()> {
        let values = entry
            .values
            .clone()
            .ok_or_else(|| eyre::eyre!("field \"{}\" has no value", entry.name))?;
        self.storage()
            .open_level(level)?
            .vectors
            .insert(entry.name.clone(), values);
        Ok(())
    }

    fn read_vector(&self, level: usize, entry: &FieldEntry) -> eyre::Result<Option<DVector<f64>>> {
        Ok(self
            .storage()
            .levels
            .get(&level)
            .and_then(|stored| stored.vectors.get(&entry.name))
            .cloned())
    }

    fn write_geometry(&mut self, level: usize, entry: &FieldEntry) -> eyre::Result<()> {
        let geometry = entry
            .geometry
            .clone()
            .ok_or_else(|| eyre::eyre!("field \"{}\" has no geometry", entry.name))?;
        self.storage()
            .open_level(level)?
            .geometry
            .insert(entry.name.clone(), geometry);
        Ok(())
    }

    fn write_time_info(&mut self, level: usize, interval: usize, time: &TimeDomain) -> eyre::Result<()> {
        self.storage().open_level(level)?.time = Some((*time, interval));
        Ok(())
    }
}
