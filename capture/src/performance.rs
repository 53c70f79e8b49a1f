//! Performance-timeline entry translation.
//!
//! Raw entries delivered by the host's performance timeline are converted to
//! [`RecordedEvent`]s by a translator chosen from the entry's type. Only
//! resource timing is supported; entries of any other type produce nothing.
//!
//! # Example
//!
//! ```
//! use shadow_capture::performance::{self, PerformanceEntry, ResourceTiming};
//! use shadow_capture::types::EventKind;
//!
//! let entry = PerformanceEntry {
//!     entry_type: "resource".to_string(),
//!     name: "https://example.com/app.js".to_string(),
//!     start_time: 10.0,
//!     duration: 42.0,
//!     resource: Some(ResourceTiming::default()),
//! };
//!
//! let event = performance::translate(&entry).expect("resource entries translate");
//! assert_eq!(event.kind(), EventKind::NetworkRequest);
//!
//! let paint = PerformanceEntry { entry_type: "paint".to_string(), ..entry };
//! assert!(performance::translate(&paint).is_none());
//! ```

use tracing::trace;

use crate::types::{NetworkRequest, RecordedEvent};

/// Callback invoked by a [`PerformanceTimeline`] with each delivered list of entries.
pub type EntryCallback = Box<dyn Fn(&[PerformanceEntry]) + Send + Sync>;

/// Entry types this crate knows how to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Resource,
}

impl EntryKind {
    /// Every supported entry kind, in subscription order.
    pub const ALL: [EntryKind; 1] = [EntryKind::Resource];

    /// Returns the timeline's name for this entry type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
        }
    }

    /// Looks up a supported entry kind by the timeline's entry-type name.
    #[must_use]
    pub fn from_entry_type(entry_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == entry_type)
    }
}

/// Milestones that only resource-timing entries carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTiming {
    pub connect_start: f64,
    pub connect_end: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub redirect_start: f64,
    pub redirect_end: f64,
    pub response_start: f64,
    pub request_start: f64,
    pub secure_connection_start: f64,
    pub response_end: f64,
    pub fetch_start: f64,
    pub worker_start: f64,
    pub decoded_body_size: f64,
    pub encoded_body_size: f64,
    pub transfer_size: f64,
    pub next_hop_protocol: String,
    pub initiator_type: String,
}

/// A raw entry as delivered by the performance timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceEntry {
    /// Timeline entry type, e.g. `resource`, `paint`, `mark`.
    pub entry_type: String,
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    /// Present only for resource-timing entries.
    pub resource: Option<ResourceTiming>,
}

/// Source of performance entries for the running page.
pub trait PerformanceTimeline: Send + Sync {
    /// High-resolution time origin of the page, in milliseconds since the epoch.
    fn time_origin(&self) -> f64;

    /// Subscribes `callback` to entries of the given kinds.
    ///
    /// The subscription lives as long as the timeline does.
    fn observe(&self, kinds: &[EntryKind], callback: EntryCallback);
}

/// Converts one kind of performance entry to a recorded event.
pub trait EntryTranslator: Send + Sync {
    /// Translates `entry`, or returns `None` when the entry is not of the
    /// type this translator handles.
    fn translate(&self, entry: &PerformanceEntry) -> Option<RecordedEvent>;
}

/// Translator for `resource` entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceTimingTranslator;

impl EntryTranslator for ResourceTimingTranslator {
    fn translate(&self, entry: &PerformanceEntry) -> Option<RecordedEvent> {
        if entry.entry_type != EntryKind::Resource.as_str() {
            return None;
        }
        let timing = entry.resource.as_ref()?;

        let network_request = NetworkRequest {
            connect_start: timing.connect_start,
            connect_end: timing.connect_end,
            domain_lookup_start: timing.domain_lookup_start,
            domain_lookup_end: timing.domain_lookup_end,
            redirect_start: timing.redirect_start,
            redirect_end: timing.redirect_end,
            response_start: timing.response_start,
            request_start: timing.request_start,
            secure_connection_start: timing.secure_connection_start,
            response_end: timing.response_end,
            fetch_start: timing.fetch_start,
            worker_start: timing.worker_start,
            decoded_body_size: timing.decoded_body_size,
            encoded_body_size: timing.encoded_body_size,
            transfer_size: timing.transfer_size,
            next_hop_protocol: timing.next_hop_protocol.clone(),
            start_time: entry.start_time,
            duration: entry.duration,
            name: entry.name.clone(),
            initiator_type: timing.initiator_type.clone(),
        };

        Some(RecordedEvent::network_request(network_request))
    }
}

/// Returns the translator registered for `kind`.
#[must_use]
pub fn translator_for(kind: EntryKind) -> &'static dyn EntryTranslator {
    match kind {
        EntryKind::Resource => &ResourceTimingTranslator,
    }
}

/// Translates a single entry. Unsupported entry types yield `None`.
#[must_use]
pub fn translate(entry: &PerformanceEntry) -> Option<RecordedEvent> {
    let Some(kind) = EntryKind::from_entry_type(&entry.entry_type) else {
        trace!(entry_type = %entry.entry_type, "Ignoring unsupported performance entry");
        return None;
    };
    translator_for(kind).translate(entry)
}

/// Translates a delivered entry list, preserving order and skipping
/// unsupported entries.
#[must_use]
pub fn translate_all(entries: &[PerformanceEntry]) -> Vec<RecordedEvent> {
    entries.iter().filter_map(translate).collect()
}
