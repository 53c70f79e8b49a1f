//! Shadow capture - client-side page telemetry.
//!
//! This crate observes a running web page, records network-resource timing
//! and user-interaction events into a per-session buffer, and periodically
//! flushes that buffer into a durable per-session record.
//!
//! # Overview
//!
//! The host supplies the page through three traits: a
//! [`PerformanceTimeline`](performance::PerformanceTimeline) for resource
//! timing, a [`Document`](interactions::Document) for DOM elements, and a
//! [`PersistenceStore`](persistence::PersistenceStore) (usually a
//! [`KeyValueStore`](persistence::KeyValueStore) over a
//! [`StorageMedium`](storage::StorageMedium)). A [`Tracker`] ties them
//! together; [`Tracker::initialize`] starts a session and returns its handle.
//!
//! Delivery is best-effort: failures are logged through `tracing` and the
//! affected events are dropped. Nothing is retried.
//!
//! # Modules
//!
//! - [`types`]: Recorded event model
//! - [`performance`]: Performance-entry translation
//! - [`interactions`]: DOM element discovery and interaction translation
//! - [`session`]: Sessions, the live buffer and the flush timer
//! - [`persistence`]: Per-session record store
//! - [`storage`]: Key-value storage media
//! - [`config`]: Session options and tracker configuration
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod interactions;
pub mod performance;
pub mod persistence;
pub mod session;
pub mod storage;
pub mod types;

pub use config::{ConfigError, ElementTracking, InitOptions, TrackerConfig};
pub use error::{CaptureError, Result};
pub use interactions::{Document, DomEvent, Element, EventTarget, InteractionSet, TrackElement};
pub use performance::{EntryKind, PerformanceEntry, PerformanceTimeline, ResourceTiming};
pub use persistence::{KeyValueStore, PersistedRecord, PersistenceError, PersistenceStore};
pub use session::{EventBuffer, Session, SessionHandle, SessionIdGenerator, Tracker, UuidSessionIds};
pub use storage::{FileStorage, MemoryStorage, StorageError, StorageMedium};
pub use types::{EventKind, EventPayload, InteractionKind, InteractionTarget, NetworkRequest, RecordedEvent};
