#![allow(unused_macros)]

/// Helper macro for locking items, turning poisoning into [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut reader = lock!(self.reader);
///  reader.seek(TableId::TypeDef, 1)?;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let reader = read_lock!(self.symbol_reader);
/// ```
macro_rules! read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.read().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut entry = write_lock!(self.entry_point);
///  *entry = Some(method);
/// ```
macro_rules! write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.write().map_err(|_| crate::Error::LockError)?
    };
}
