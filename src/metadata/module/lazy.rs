use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::{
    metadata::module::{Module, ModuleReader},
    Result,
};

/// A memo slot realized from the module's image at most once.
///
/// The first access takes the module's reader lock, decodes inside a cursor frame and
/// stores the result. Later accesses return the stored value without touching the lock or
/// the image. A decode that fails stores nothing, so a later access decodes again.
///
/// Decoders that run while the reader lock is already held (nested loads) must use
/// [`LazyCell::get_or_read_locked`] with the reader they were given; the lock is not
/// re-entrant.
pub(crate) struct LazyCell<T> {
    slot: OnceLock<Arc<T>>,
    what: &'static str,
}

impl<T> LazyCell<T> {
    pub(crate) fn new(what: &'static str) -> Self {
        LazyCell {
            slot: OnceLock::new(),
            what,
        }
    }

    /// A cell that is realized from the start, for modules without an image
    pub(crate) fn ready(what: &'static str, value: T) -> Self {
        let cell = LazyCell::new(what);
        let _ = cell.slot.set(Arc::new(value));
        cell
    }

    pub(crate) fn get(&self) -> Option<&Arc<T>> {
        self.slot.get()
    }

    pub(crate) fn get_or_read(
        &self,
        module: &Module,
        decode: impl FnOnce(&Module, &mut ModuleReader) -> Result<T>,
    ) -> Result<Arc<T>> {
        module.ensure_live()?;
        if let Some(value) = self.slot.get() {
            return Ok(value.clone());
        }

        let mut reader = lock!(module.reader);
        self.get_or_read_locked(module, &mut reader, decode)
    }

    pub(crate) fn get_or_read_locked(
        &self,
        module: &Module,
        reader: &mut ModuleReader,
        decode: impl FnOnce(&Module, &mut ModuleReader) -> Result<T>,
    ) -> Result<Arc<T>> {
        if let Some(value) = self.slot.get() {
            return Ok(value.clone());
        }

        let value = reader.frame(|reader| decode(module, reader))?;
        debug!(module = %module.name(), collection = self.what, "realized lazy collection");

        Ok(self.slot.get_or_init(|| Arc::new(value)).clone())
    }
}
