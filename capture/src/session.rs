//! Capture sessions: identity, live buffer and periodic flush.
//!
//! A [`Tracker`] holds the collaborators a session needs (persistence store,
//! performance timeline, document, session-id generator). Each call to
//! [`Tracker::initialize`] starts a fresh, independent session:
//!
//! 1. A session id is generated and the page's time origin is synced to the
//!    store.
//! 2. A repeating timer flushes the session's [`EventBuffer`] every
//!    [`TrackerConfig::upload_interval`].
//! 3. Performance entries and DOM interactions are translated and appended to
//!    the buffer as they arrive.
//!
//! There is no teardown: listeners and the timer stay registered for the life
//! of the page and the async runtime.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shadow_capture::config::InitOptions;
//! use shadow_capture::interactions::Document;
//! use shadow_capture::performance::PerformanceTimeline;
//! use shadow_capture::persistence::KeyValueStore;
//! use shadow_capture::session::Tracker;
//! use shadow_capture::storage::FileStorage;
//!
//! # fn host() -> (Arc<dyn PerformanceTimeline>, Arc<dyn Document>) { unimplemented!() }
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (timeline, document) = host();
//!     let store = Arc::new(KeyValueStore::new(FileStorage::open_default()?));
//!
//!     let tracker = Tracker::new(store, timeline, document);
//!     let session = tracker.initialize(&InitOptions::default());
//!     println!("capturing session {}", session.session_id());
//!
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::config::{InitOptions, TrackerConfig};
use crate::error::Result;
use crate::interactions::{self, Document, DomEvent, TrackElement};
use crate::performance::{self, EntryKind, PerformanceEntry, PerformanceTimeline};
use crate::persistence::PersistenceStore;
use crate::types::RecordedEvent;

/// Produces opaque, unique session identifiers.
pub trait SessionIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Session ids from random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSessionIds;

impl SessionIdGenerator for UuidSessionIds {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Identity of a capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    /// Page time origin at initialization, in milliseconds since the epoch.
    pub time_origin: f64,
}

/// Append-only buffer of events captured since the last flush.
///
/// Appends and [`take`](Self::take) each hold the lock for their whole
/// duration, so an event lands either in the batch being taken or in the
/// fresh buffer that replaces it, never both and never neither.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Mutex<Vec<RecordedEvent>>,
}

impl EventBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: RecordedEvent) {
        self.lock().push(event);
    }

    /// Appends several events in order.
    pub fn extend(&self, events: impl IntoIterator<Item = RecordedEvent>) {
        self.lock().extend(events);
    }

    /// Swaps the buffered events out for an empty buffer.
    #[must_use]
    pub fn take(&self) -> Vec<RecordedEvent> {
        std::mem::take(&mut *self.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running capture session.
///
/// Cloning the handle shares the session; it does not start a new one.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Session>,
    buffer: Arc<EventBuffer>,
    store: Arc<dyn PersistenceStore>,
}

impl SessionHandle {
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    /// Number of events waiting for the next flush.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Hands the buffered events to the store as one batch.
    ///
    /// Runs the store call on the calling thread; the periodic timer calls
    /// this through `spawn_blocking`.
    ///
    /// Does nothing when the buffer is empty. A batch the store rejects is
    /// logged and dropped; it is not put back.
    ///
    /// # Returns
    ///
    /// The number of events taken from the buffer.
    pub fn flush(&self) -> usize {
        let batch = self.buffer.take();
        if batch.is_empty() {
            trace!(session_id = %self.session.session_id, "Nothing to flush");
            return 0;
        }

        let count = batch.len();
        match self.store.upload_events(&self.session.session_id, &batch) {
            Ok(()) => debug!(
                session_id = %self.session.session_id,
                events = count,
                "Flushed event batch"
            ),
            Err(e) => error!(
                session_id = %self.session.session_id,
                events = count,
                error = %e,
                "Failed to persist event batch, events dropped"
            ),
        }
        count
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.session)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

/// Starts capture sessions against a fixed set of collaborators.
pub struct Tracker {
    config: TrackerConfig,
    store: Arc<dyn PersistenceStore>,
    timeline: Arc<dyn PerformanceTimeline>,
    document: Arc<dyn Document>,
    session_ids: Arc<dyn SessionIdGenerator>,
}

impl Tracker {
    /// Creates a tracker with the default configuration and UUID session ids.
    #[must_use]
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        timeline: Arc<dyn PerformanceTimeline>,
        document: Arc<dyn Document>,
    ) -> Self {
        Self {
            config: TrackerConfig::default(),
            store,
            timeline,
            document,
            session_ids: Arc::new(UuidSessionIds),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_session_ids(mut self, session_ids: Arc<dyn SessionIdGenerator>) -> Self {
        self.session_ids = session_ids;
        self
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Starts a new capture session.
    ///
    /// Never fails: store errors are logged, and without an ambient tokio
    /// runtime the periodic flush is skipped (call
    /// [`SessionHandle::flush`] instead). Calling this twice starts two
    /// independent sessions, each with its own buffer and timer.
    pub fn initialize(&self, options: &InitOptions) -> SessionHandle {
        let session = Session {
            session_id: self.session_ids.generate(),
            time_origin: self.timeline.time_origin(),
        };

        if let Err(e) = self
            .store
            .sync_time_origin(&session.session_id, session.time_origin)
        {
            error!(
                session_id = %session.session_id,
                error = %e,
                "Failed to sync time origin"
            );
        }

        let handle = SessionHandle {
            session: Arc::new(session),
            buffer: Arc::new(EventBuffer::new()),
            store: Arc::clone(&self.store),
        };

        self.spawn_flush_timer(handle.clone());

        if !options.skip_network_requests {
            self.observe_performance(&handle.buffer);
        }

        if !options.skip_user_interactions {
            self.bind_interactions(options, &handle.buffer);
        }

        info!(
            session_id = %handle.session_id(),
            time_origin = handle.session().time_origin,
            network_requests = !options.skip_network_requests,
            user_interactions = !options.skip_user_interactions,
            "Capture session started"
        );

        handle
    }

    /// Parses `options_json` and starts a session with it.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::Config` if the options do not parse; no session
    /// is started in that case.
    pub fn initialize_json(&self, options_json: &str) -> Result<SessionHandle> {
        let options = InitOptions::from_json(options_json)?;
        Ok(self.initialize(&options))
    }

    fn spawn_flush_timer(&self, handle: SessionHandle) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(
                session_id = %handle.session_id(),
                "No async runtime available, periodic flush disabled"
            );
            return;
        };

        let period = self.config.upload_interval;
        runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Stores may block on file I/O.
                let flushing = handle.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || flushing.flush()).await {
                    error!(
                        session_id = %handle.session_id(),
                        error = %e,
                        "Flush task panicked, events dropped"
                    );
                }
            }
        });
    }

    fn observe_performance(&self, buffer: &Arc<EventBuffer>) {
        let buffer = Arc::clone(buffer);
        self.timeline.observe(
            &EntryKind::ALL,
            Box::new(move |entries: &[PerformanceEntry]| {
                buffer.extend(performance::translate_all(entries));
            }),
        );
    }

    fn bind_interactions(&self, options: &InitOptions, buffer: &Arc<EventBuffer>) {
        for element_kind in TrackElement::ALL {
            let Some(kinds) = options.interactions_for(element_kind) else {
                debug!(element = ?element_kind, "Skipping element kind");
                continue;
            };

            let elements = element_kind.handler().discover(self.document.as_ref());
            debug!(
                element = ?element_kind,
                count = elements.len(),
                interactions = ?kinds,
                "Binding interaction listeners"
            );

            for element in &elements {
                for &kind in &kinds {
                    let buffer = Arc::clone(buffer);
                    element.add_event_listener(
                        kind,
                        Box::new(move |event: &DomEvent| {
                            buffer.push(interactions::translate(event, kind));
                        }),
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
