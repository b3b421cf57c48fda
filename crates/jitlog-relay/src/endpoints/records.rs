//! Lookup of uploaded JIT-log records by checksum.

use thiserror::Error;

use crate::errors::RelayError;

/// An uploaded JIT log as seen by the read endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitlogRecord {
    /// Checksum identifying the upload; also the profile id sent to the cache.
    pub checksum: String,
    /// Server-side path of the stored log file.
    pub file_path: String,
}

impl JitlogRecord {
    /// Creates a record.
    pub fn new(checksum: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            checksum: checksum.into(),
            file_path: file_path.into(),
        }
    }
}

/// Failure of the underlying record storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Creates a storage error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Storage of uploaded JIT-log records.
#[cfg_attr(test, mockall::automock)]
pub trait RecordStore: Send + Sync {
    /// Returns every record whose checksum equals `checksum`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the storage cannot be queried.
    fn find_by_checksum(&self, checksum: &str) -> Result<Vec<JitlogRecord>, StoreError>;
}

/// Loads the single record for `checksum`.
///
/// # Errors
///
/// Returns [`RelayError::NotFound`] when no record matches,
/// [`RelayError::BadRequest`] when several do, and [`RelayError::Store`] when
/// the store itself fails.
pub fn load_record<S>(store: &S, checksum: &str) -> Result<JitlogRecord, RelayError>
where
    S: RecordStore + ?Sized,
{
    let mut records = store
        .find_by_checksum(checksum)
        .map_err(|error| RelayError::Store {
            message: error.to_string(),
        })?;
    match records.len() {
        0 => Err(RelayError::not_found_bare()),
        1 => records.pop().ok_or_else(RelayError::not_found_bare),
        _ => Err(RelayError::bad_request("checksum has several jit logs")),
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    #[test]
    fn returns_the_unique_record() {
        let mut store = MockRecordStore::new();
        store
            .expect_find_by_checksum()
            .with(eq("abc123"))
            .returning(|checksum| Ok(vec![JitlogRecord::new(checksum, "/var/logs/x.jitlog")]));

        let record = load_record(&store, "abc123").expect("record");
        assert_eq!(record.file_path, "/var/logs/x.jitlog");
    }

    #[test]
    fn missing_record_is_not_found() {
        let mut store = MockRecordStore::new();
        store.expect_find_by_checksum().returning(|_| Ok(Vec::new()));

        let error = load_record(&store, "nope").expect_err("no record");
        assert_eq!(error.status_code(), 404);
    }

    #[test]
    fn duplicate_records_are_a_bad_request() {
        let mut store = MockRecordStore::new();
        store.expect_find_by_checksum().returning(|checksum| {
            Ok(vec![
                JitlogRecord::new(checksum, "/a"),
                JitlogRecord::new(checksum, "/b"),
            ])
        });

        let error = load_record(&store, "dup").expect_err("ambiguous");
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.to_string(), "checksum has several jit logs");
    }

    #[test]
    fn store_failures_are_internal() {
        let mut store = MockRecordStore::new();
        store
            .expect_find_by_checksum()
            .returning(|_| Err(StoreError::new("database is locked")));

        let error = load_record(&store, "abc").expect_err("store fails");
        assert_eq!(error.status_code(), 500);
        assert_eq!(error.to_body().message, "internal server error");
    }
}
