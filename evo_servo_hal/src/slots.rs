//! Slot arena holding every exported numeric value.
//!
//! Each handler group owns one fixed-size record. Records are allocated
//! once by `SlotArenaBuilder` and never resized, so a `RecordId` stays
//! valid for the arena's lifetime. A record is guarded as a whole: a
//! reader copying a record never sees half of a cycle's update.
//!
//! Never hold two record guards at once; copy out, release, then lock
//! the next record.

use std::sync::{Arc, Mutex, MutexGuard};

/// Stable handle to a record in a `SlotArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

impl RecordId {
    /// Position of the record in the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Collects record sizes before the arena is allocated.
#[derive(Debug, Default)]
pub struct SlotArenaBuilder {
    sizes: Vec<usize>,
}

impl SlotArenaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a record of `len` zeroed slots.
    pub fn add_record(&mut self, len: usize) -> RecordId {
        self.sizes.push(len);
        RecordId(self.sizes.len() - 1)
    }

    /// Allocate the arena.
    pub fn build(self) -> Arc<SlotArena> {
        let records = self
            .sizes
            .into_iter()
            .map(|len| Mutex::new(vec![0.0; len].into_boxed_slice()))
            .collect();
        Arc::new(SlotArena { records })
    }
}

/// Fixed set of value records shared between the cycle and its observers.
#[derive(Debug)]
pub struct SlotArena {
    records: Box<[Mutex<Box<[f64]>>]>,
}

impl SlotArena {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the arena has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lock one record for a multi-field update.
    ///
    /// # Panics
    /// Panics if `record` was not produced by this arena's builder.
    pub fn lock(&self, record: RecordId) -> MutexGuard<'_, Box<[f64]>> {
        self.records[record.0]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Read one slot.
    #[inline]
    pub fn get(&self, record: RecordId, field: usize) -> f64 {
        self.lock(record)[field]
    }

    /// Write one slot.
    #[inline]
    pub fn set(&self, record: RecordId, field: usize, value: f64) {
        self.lock(record)[field] = value;
    }

    /// Copy a whole record out.
    pub fn snapshot(&self, record: RecordId) -> Vec<f64> {
        self.lock(record).to_vec()
    }

    /// Copy `values` into a record, truncating to the record length.
    pub fn store(&self, record: RecordId, values: &[f64]) {
        let mut guard = self.lock(record);
        let n = guard.len().min(values.len());
        guard[..n].copy_from_slice(&values[..n]);
    }
}

/// Accessor to one exported slot, handed to the host.
///
/// The host reads and writes through the accessor; the arena keeps
/// ownership of the storage.
#[derive(Debug, Clone)]
pub struct SlotRef {
    arena: Arc<SlotArena>,
    record: RecordId,
    field: usize,
}

impl SlotRef {
    pub(crate) fn new(arena: Arc<SlotArena>, record: RecordId, field: usize) -> Self {
        Self {
            arena,
            record,
            field,
        }
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f64 {
        self.arena.get(self.record, self.field)
    }

    /// Overwrite the value.
    #[inline]
    pub fn set(&self, value: f64) {
        self.arena.set(self.record, self.field, value);
    }

    /// Record this slot belongs to.
    pub fn record(&self) -> RecordId {
        self.record
    }
}
