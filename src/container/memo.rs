use std::sync::OnceLock;

use parking_lot::Mutex;

/// A value computed at most once, on first successful access.
///
/// Concurrent first accesses are serialized so the computation runs once;
/// a failed computation leaves the cell empty for the next caller.
pub(crate) struct Memo<T> {
    cell: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> Memo<T> {
    pub(crate) fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub(crate) fn get_or_try_init<E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(v) = self.cell.get() {
            return Ok(v);
        }
        let _guard = self.init.lock();
        if let Some(v) = self.cell.get() {
            return Ok(v);
        }
        let value = f()?;
        Ok(self.cell.get_or_init(|| value))
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}
