//! Per-session persistence of flushed event batches.
//!
//! This module defines the [`PersistenceStore`] capability used by sessions to
//! record their time origin and hand over flushed batches, and
//! [`KeyValueStore`], the implementation backed by a [`StorageMedium`].
//!
//! # Design
//!
//! - **Best-effort**: nothing here retries. A batch uploaded for a session with
//!   no stored record is dropped and reported; it is never written elsewhere.
//!
//! - **Asymmetric writes**: [`sync_time_origin`](PersistenceStore::sync_time_origin)
//!   creates the record when it is missing, [`upload_events`](PersistenceStore::upload_events)
//!   does not. A session whose record disappears loses every later batch until
//!   something re-creates the record.
//!
//! - **Corruption tolerance**: a stored value that fails to parse is logged
//!   with its key and raw contents and then treated as absent. It is left in
//!   place; the next successful time-origin sync overwrites it.
//!
//! # Example
//!
//! ```
//! use shadow_capture::persistence::{KeyValueStore, PersistenceStore};
//! use shadow_capture::storage::MemoryStorage;
//! use shadow_capture::types::{InteractionKind, InteractionTarget, RecordedEvent};
//!
//! let store = KeyValueStore::new(MemoryStorage::new());
//! store.sync_time_origin("s1", 123.4).unwrap();
//!
//! let event = RecordedEvent::user_interaction(InteractionKind::Click, InteractionTarget::default());
//! store.upload_events("s1", &[event.clone()]).unwrap();
//!
//! let record = store.read_record("s1").unwrap().unwrap();
//! assert_eq!(record.time_origin, 123.4);
//! assert_eq!(record.event_batches, vec![vec![event]]);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::DEFAULT_KEY_PREFIX;
use crate::storage::{StorageError, StorageMedium};
use crate::types::RecordedEvent;

/// Errors that can occur during event persistence.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The storage medium failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The time origin is NaN or infinite and cannot be stored as JSON.
    #[error("invalid time origin {time_origin} for session {session_id}")]
    InvalidTimeOrigin {
        /// Session whose sync was rejected.
        session_id: String,
        /// The rejected value.
        time_origin: f64,
    },

    /// No record exists for the session; the batch was dropped.
    #[error("session {session_id} not found, {dropped} events dropped")]
    SessionNotFound {
        /// Session the batch belonged to.
        session_id: String,
        /// Number of events in the dropped batch.
        dropped: usize,
    },
}

/// Durable record kept for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    /// Performance time origin of the page that produced the session.
    pub time_origin: f64,

    /// Flushed batches in flush order; each batch in capture order.
    #[serde(rename = "events")]
    pub event_batches: Vec<Vec<RecordedEvent>>,
}

impl PersistedRecord {
    /// Creates a record with no batches.
    #[must_use]
    pub fn new(time_origin: f64) -> Self {
        Self {
            time_origin,
            event_batches: Vec::new(),
        }
    }
}

/// Destination for a session's time origin and flushed batches.
pub trait PersistenceStore: Send + Sync {
    /// Records `time_origin` for the session, creating the record if needed.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::InvalidTimeOrigin` if `time_origin` is not
    /// finite, or another `PersistenceError` if the record cannot be written.
    fn sync_time_origin(&self, session_id: &str, time_origin: f64) -> Result<(), PersistenceError>;

    /// Appends `batch` to the session's record.
    ///
    /// Empty batches are ignored.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::SessionNotFound` if the session has no
    /// readable record, in which case the batch is dropped.
    fn upload_events(&self, session_id: &str, batch: &[RecordedEvent]) -> Result<(), PersistenceError>;
}

/// Persistence store doing read-modify-write against a key-value medium.
///
/// Each session's record lives under `<prefix><session_id>` as JSON.
///
/// Two writers updating the same session concurrently each read, modify and
/// write the whole record with no compare-and-set in between, so one of the
/// updates can be lost. The provided media offer no atomic update to build on.
#[derive(Debug)]
pub struct KeyValueStore<M> {
    medium: M,
    key_prefix: String,
}

impl<M: StorageMedium> KeyValueStore<M> {
    /// Creates a store using the default `shdw-events-` key prefix.
    #[must_use]
    pub fn new(medium: M) -> Self {
        Self::with_prefix(medium, DEFAULT_KEY_PREFIX)
    }

    #[must_use]
    pub fn with_prefix(medium: M, key_prefix: impl Into<String>) -> Self {
        Self {
            medium,
            key_prefix: key_prefix.into(),
        }
    }

    /// Returns the underlying medium.
    #[must_use]
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Storage key for a session.
    #[must_use]
    pub fn key_for(&self, session_id: &str) -> String {
        format!("{}{session_id}", self.key_prefix)
    }

    /// Reads the stored record for a session.
    ///
    /// Missing and corrupted records both read as `None`; corruption is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Storage` if the medium cannot be read.
    pub fn read_record(&self, session_id: &str) -> Result<Option<PersistedRecord>, PersistenceError> {
        let key = self.key_for(session_id);
        let Some(raw) = self.medium.get_item(&key)? else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<Option<PersistedRecord>>(&raw) {
            Ok(record) => Ok(record),
            Err(e) => {
                error!(
                    key = %key,
                    raw = %raw,
                    error = %e,
                    "Corrupted data found, treating record as absent"
                );
                Ok(None)
            }
        }
    }

    fn write_record(&self, session_id: &str, record: &PersistedRecord) -> Result<(), PersistenceError> {
        let body = serde_json::to_string(record)?;
        self.medium.set_item(&self.key_for(session_id), &body)?;
        Ok(())
    }
}

impl<M: StorageMedium> PersistenceStore for KeyValueStore<M> {
    fn sync_time_origin(&self, session_id: &str, time_origin: f64) -> Result<(), PersistenceError> {
        // JSON has no NaN or infinity; serde_json would write `null` and the
        // record would read back as corrupt.
        if !time_origin.is_finite() {
            return Err(PersistenceError::InvalidTimeOrigin {
                session_id: session_id.to_string(),
                time_origin,
            });
        }

        let record = match self.read_record(session_id)? {
            Some(mut existing) => {
                existing.time_origin = time_origin;
                existing
            }
            None => PersistedRecord::new(time_origin),
        };

        self.write_record(session_id, &record)?;
        debug!(session_id = %session_id, time_origin, "Time origin synced");
        Ok(())
    }

    fn upload_events(&self, session_id: &str, batch: &[RecordedEvent]) -> Result<(), PersistenceError> {
        if batch.is_empty() {
            return Ok(());
        }

        let Some(mut record) = self.read_record(session_id)? else {
            error!(
                session_id = %session_id,
                dropped = batch.len(),
                "Session not found, unable to save events"
            );
            return Err(PersistenceError::SessionNotFound {
                session_id: session_id.to_string(),
                dropped: batch.len(),
            });
        };

        record.event_batches.push(batch.to_vec());
        self.write_record(session_id, &record)?;
        debug!(
            session_id = %session_id,
            events = batch.len(),
            batches = record.event_batches.len(),
            "Events persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{InteractionKind, InteractionTarget, NetworkRequest};

    /// Medium that counts writes, for asserting the write path is untouched.
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        writes: AtomicUsize,
    }

    impl StorageMedium for CountingStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_item(key, value)
        }
    }

    fn click(id: &str) -> RecordedEvent {
        RecordedEvent::user_interaction(
            InteractionKind::Click,
            InteractionTarget {
                id: id.to_string(),
                ..InteractionTarget::default()
            },
        )
    }

    fn store() -> KeyValueStore<CountingStorage> {
        KeyValueStore::new(CountingStorage::default())
    }

    #[test]
    fn test_key_uses_prefix() {
        assert_eq!(store().key_for("abc"), "shdw-events-abc");
        let custom = KeyValueStore::with_prefix(MemoryStorage::new(), "app-");
        assert_eq!(custom.key_for("abc"), "app-abc");
    }

    #[test]
    fn test_sync_creates_record() {
        let store = store();
        store.sync_time_origin("s1", 1700000000000.5).unwrap();

        let record = store.read_record("s1").unwrap().unwrap();
        assert_eq!(record, PersistedRecord::new(1700000000000.5));
    }

    #[test]
    fn test_empty_upload_never_writes() {
        let store = store();
        store.sync_time_origin("s1", 1.0).unwrap();
        let before = store.medium().get_item("shdw-events-s1").unwrap();
        let writes = store.medium().writes.load(Ordering::SeqCst);

        store.upload_events("s1", &[]).unwrap();
        store.upload_events("missing", &[]).unwrap();

        assert_eq!(store.medium().writes.load(Ordering::SeqCst), writes);
        assert_eq!(store.medium().get_item("shdw-events-s1").unwrap(), before);
        assert!(store.medium().get_item("shdw-events-missing").unwrap().is_none());
    }

    #[test]
    fn test_upload_preserves_batch_order() {
        let store = store();
        store.sync_time_origin("s1", 1.0).unwrap();

        let batch: Vec<RecordedEvent> = (0..5).map(|i| click(&format!("el-{i}"))).collect();
        store.upload_events("s1", &batch).unwrap();

        let record = store.read_record("s1").unwrap().unwrap();
        assert_eq!(record.event_batches, vec![batch]);
    }

    #[test]
    fn test_sync_corrupted_record_recreates_fresh() {
        let store = store();
        store
            .medium()
            .set_item("shdw-events-s1", "{not json")
            .unwrap();

        store.sync_time_origin("s1", 42.0).unwrap();

        let raw = store.medium().get_item("shdw-events-s1").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json, serde_json::json!({ "timeOrigin": 42.0, "events": [] }));
    }

    #[test]
    fn test_upload_without_record_drops_batch() {
        let store = store();

        let err = store.upload_events("s1", &[click("a")]).unwrap_err();

        assert!(matches!(
            err,
            PersistenceError::SessionNotFound { ref session_id, dropped: 1 } if session_id == "s1"
        ));
        assert!(store.medium().get_item("shdw-events-s1").unwrap().is_none());
        assert_eq!(store.medium().writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_upload_with_corrupted_record_drops_batch_and_keeps_value() {
        let store = store();
        store.medium().set_item("shdw-events-s1", "[1,2").unwrap();
        let writes = store.medium().writes.load(Ordering::SeqCst);

        let result = store.upload_events("s1", &[click("a")]);

        assert!(matches!(result, Err(PersistenceError::SessionNotFound { .. })));
        assert_eq!(store.medium().writes.load(Ordering::SeqCst), writes);
        assert_eq!(
            store.medium().get_item("shdw-events-s1").unwrap().as_deref(),
            Some("[1,2")
        );
    }

    #[test]
    fn test_wrong_shape_is_treated_as_corrupt() {
        let store = store();
        store
            .medium()
            .set_item("shdw-events-s1", r#"{"timeOrigin":"soon"}"#)
            .unwrap();

        assert!(store.read_record("s1").unwrap().is_none());
    }

    #[test]
    fn test_null_and_empty_values_read_as_absent() {
        let store = store();
        store.medium().set_item("shdw-events-a", "null").unwrap();
        store.medium().set_item("shdw-events-b", "").unwrap();

        assert!(store.read_record("a").unwrap().is_none());
        assert!(store.read_record("b").unwrap().is_none());
    }

    #[test]
    fn test_resync_overwrites_time_origin_only() {
        let store = store();
        store.sync_time_origin("s1", 10.0).unwrap();
        store.upload_events("s1", &[click("a")]).unwrap();
        let batches = store.read_record("s1").unwrap().unwrap().event_batches;

        store.sync_time_origin("s1", 20.0).unwrap();

        let record = store.read_record("s1").unwrap().unwrap();
        assert_eq!(record.time_origin, 20.0);
        assert_eq!(record.event_batches, batches);
    }

    #[test]
    fn test_batches_accumulate_in_flush_order() {
        let store = store();
        store.sync_time_origin("s1", 0.0).unwrap();

        let batches = vec![
            vec![click("a")],
            vec![
                click("b"),
                RecordedEvent::network_request(NetworkRequest {
                    name: "https://example.com/".to_string(),
                    ..NetworkRequest::default()
                }),
            ],
            vec![click("c"), click("d"), click("e")],
        ];
        for batch in &batches {
            store.upload_events("s1", batch).unwrap();
        }

        let record = store.read_record("s1").unwrap().unwrap();
        assert_eq!(record.event_batches.len(), 3);
        assert_eq!(record.event_batches, batches);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = store();
        store.sync_time_origin("s1", 1.0).unwrap();
        store.sync_time_origin("s2", 2.0).unwrap();

        store.upload_events("s1", &[click("only-s1")]).unwrap();

        assert_eq!(store.read_record("s1").unwrap().unwrap().event_batches.len(), 1);
        assert!(store.read_record("s2").unwrap().unwrap().event_batches.is_empty());
    }

    #[test]
    fn test_non_finite_time_origin_is_rejected_without_writing() {
        let store = store();

        for origin in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = store.sync_time_origin("s1", origin).unwrap_err();
            assert!(matches!(
                err,
                PersistenceError::InvalidTimeOrigin { ref session_id, .. } if session_id == "s1"
            ));
        }
        assert_eq!(store.medium().writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_non_finite_resync_keeps_existing_record() {
        let store = store();
        store.sync_time_origin("s1", 5.0).unwrap();

        assert!(store.sync_time_origin("s1", f64::NAN).is_err());
        store.upload_events("s1", &[click("after")]).unwrap();

        let record = store.read_record("s1").unwrap().unwrap();
        assert_eq!(record.time_origin, 5.0);
        assert_eq!(record.event_batches.len(), 1);
    }

    #[test]
    fn test_persistence_error_display() {
        let err = PersistenceError::SessionNotFound {
            session_id: "abc".to_string(),
            dropped: 3,
        };
        assert_eq!(err.to_string(), "session abc not found, 3 events dropped");
    }
}
