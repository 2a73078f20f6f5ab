/// Swappable callback table reference
///
/// The host may replace its callback table between any two device calls, so
/// the device holds a *reference to the slot* rather than the table itself
/// and resolves the current table at the start of every call. The resolved
/// `Arc` is a temporary; it must never be stored in a field.

use std::sync::{Arc, RwLock};
use crate::error::{Error, Result};

pub struct CallbackTable<T: ?Sized> {
    current: Arc<RwLock<Arc<T>>>,
}

impl<T: ?Sized> CallbackTable<T> {
    /// Create a slot holding `table`
    pub fn new(table: Arc<T>) -> Self {
        Self {
            current: Arc::new(RwLock::new(table)),
        }
    }

    /// Install a new table; calls that start afterwards use it
    pub fn replace(&self, table: Arc<T>) -> Result<()> {
        let mut lock = self.current.write()
            .map_err(|_| Error::Fatal("callback table lock poisoned".to_string()))?;
        *lock = table;
        Ok(())
    }

    /// Resolve the table installed right now
    pub fn resolve(&self) -> Result<Arc<T>> {
        let lock = self.current.read()
            .map_err(|_| Error::Fatal("callback table lock poisoned".to_string()))?;
        Ok(Arc::clone(&lock))
    }
}

impl<T: ?Sized> Clone for CallbackTable<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}
