//! Persistent object store seam

use thiserror::Error;

/// Object store failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum StoreError {
    /// The object could not be written
    #[error("object store write failed")]
    WriteFailed,
}

/// Key/value store that survives reflashing the application
pub trait ObjectStore {
    /// Latest value stored under `key`
    fn find_object(&self, key: &str) -> Option<&[u8]>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// [`StoreError::WriteFailed`] if the value could not be persisted.
    fn store_object(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &mut S {
    fn find_object(&self, key: &str) -> Option<&[u8]> {
        (**self).find_object(key)
    }

    fn store_object(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).store_object(key, value)
    }
}
