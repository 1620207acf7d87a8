use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::DashSet;
use strum::IntoEnumIterator;

use crate::{
    metadata::{
        image::{Image, ImageHeader},
        tables::{RawRow, TableId},
    },
    Error::OutOfBounds,
    Result,
};

/// Counters and fault switches shared between a [`MemoryImage`] and whoever built it.
///
/// Every successful [`Image::read_row`] is counted per table. A table marked with
/// [`ImageProbe::fail`] makes every decode of one of its rows fail with a `Malformed` error
/// until [`ImageProbe::heal`] is called.
#[derive(Debug)]
pub struct ImageProbe {
    decodes: Vec<AtomicUsize>,
    failing: DashSet<TableId>,
}

impl Default for ImageProbe {
    fn default() -> Self {
        ImageProbe {
            decodes: (0..=u8::MAX).map(|_| AtomicUsize::new(0)).collect(),
            failing: DashSet::new(),
        }
    }
}

impl ImageProbe {
    /// Number of rows of `table` decoded so far
    #[must_use]
    pub fn decodes(&self, table: TableId) -> usize {
        self.decodes[table.as_byte() as usize].load(Ordering::Acquire)
    }

    /// Number of rows decoded so far over all tables
    #[must_use]
    pub fn total_decodes(&self) -> usize {
        self.decodes
            .iter()
            .map(|count| count.load(Ordering::Acquire))
            .sum()
    }

    /// Make every decode of a `table` row fail
    pub fn fail(&self, table: TableId) {
        self.failing.insert(table);
    }

    /// Undo [`ImageProbe::fail`]
    pub fn heal(&self, table: TableId) {
        self.failing.remove(&table);
    }

    fn record(&self, table: TableId) -> Result<()> {
        if self.failing.contains(&table) {
            return Err(malformed_error!("Injected decode failure in table {}", table));
        }

        self.decodes[table.as_byte() as usize].fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// An [`Image`] over rows that are already decoded.
///
/// Tables are laid out back to back in [`TableId`] order, so a cursor position is a global
/// row ordinal and [`Image::read_row`] walks from the last row of one table into the first
/// row of the next, like a cursor over the on-disk table stream would.
pub struct MemoryImage {
    header: ImageHeader,
    tables: BTreeMap<TableId, Vec<RawRow>>,
    bases: BTreeMap<TableId, u64>,
    end: u64,
    position: u64,
    probe: Arc<ImageProbe>,
}

impl MemoryImage {
    /// Start building an image with a default header
    #[must_use]
    pub fn builder() -> MemoryImageBuilder {
        MemoryImageBuilder::default()
    }

    /// The probe counting decodes of this image
    #[must_use]
    pub fn probe(&self) -> Arc<ImageProbe> {
        self.probe.clone()
    }

    fn locate(&self, position: u64) -> Option<(TableId, usize)> {
        let (table, base) = self.bases.range(..).rev().find(|(_, base)| **base <= position)?;
        let index = usize::try_from(position - base).ok()?;
        let rows = self.tables.get(table)?;

        (index < rows.len()).then_some((*table, index))
    }
}

impl Image for MemoryImage {
    fn header(&self) -> &ImageHeader {
        &self.header
    }

    fn table_length(&self, table: TableId) -> u32 {
        self.tables
            .get(&table)
            .map_or(0, |rows| u32::try_from(rows.len()).unwrap_or(u32::MAX))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn set_position(&mut self, position: u64) -> Result<()> {
        if position > self.end {
            return Err(OutOfBounds);
        }

        self.position = position;
        Ok(())
    }

    fn seek(&mut self, table: TableId, row: u32) -> Result<()> {
        if row == 0 || row > self.table_length(table) {
            return Err(OutOfBounds);
        }

        let base = self.bases.get(&table).ok_or(OutOfBounds)?;
        self.position = base + u64::from(row - 1);
        Ok(())
    }

    fn read_row(&mut self) -> Result<RawRow> {
        let (table, index) = self.locate(self.position).ok_or(OutOfBounds)?;
        self.probe.record(table)?;

        let row = self
            .tables
            .get(&table)
            .and_then(|rows| rows.get(index))
            .cloned()
            .ok_or(OutOfBounds)?;

        self.position += 1;
        Ok(row)
    }
}

/// Builder for [`MemoryImage`]
#[derive(Default)]
pub struct MemoryImageBuilder {
    header: ImageHeader,
    tables: BTreeMap<TableId, Vec<RawRow>>,
    probe: Option<Arc<ImageProbe>>,
}

impl MemoryImageBuilder {
    /// Replace the image header
    #[must_use]
    pub fn header(mut self, header: ImageHeader) -> Self {
        self.header = header;
        self
    }

    /// Append a row to the table it belongs to, returning its 1-based row index
    pub fn push(&mut self, row: RawRow) -> u32 {
        let rows = self.tables.entry(row.table()).or_default();
        rows.push(row);
        u32::try_from(rows.len()).unwrap_or(u32::MAX)
    }

    /// Append a row, builder style
    #[must_use]
    pub fn row(mut self, row: RawRow) -> Self {
        self.push(row);
        self
    }

    /// Share an existing probe instead of creating a fresh one
    #[must_use]
    pub fn probe(mut self, probe: Arc<ImageProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Number of rows pushed to `table` so far
    #[must_use]
    pub fn len(&self, table: TableId) -> u32 {
        self.tables
            .get(&table)
            .map_or(0, |rows| u32::try_from(rows.len()).unwrap_or(u32::MAX))
    }

    /// Finish the image
    #[must_use]
    pub fn build(self) -> MemoryImage {
        let mut bases = BTreeMap::new();
        let mut next = 0u64;
        for table in TableId::iter() {
            if let Some(rows) = self.tables.get(&table) {
                bases.insert(table, next);
                next += rows.len() as u64;
            }
        }

        MemoryImage {
            header: self.header,
            tables: self.tables,
            bases,
            end: next,
            position: 0,
            probe: self.probe.unwrap_or_default(),
        }
    }
}
