//! Test doubles for the page collaborators.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use shadow_capture::interactions::{Document, DomEvent, Element, EventTarget, Listener};
use shadow_capture::performance::{
    EntryCallback, EntryKind, PerformanceEntry, PerformanceTimeline, ResourceTiming,
};
use shadow_capture::persistence::{PersistenceError, PersistenceStore};
use shadow_capture::session::SessionIdGenerator;
use shadow_capture::types::{InteractionKind, RecordedEvent};

// =============================================================================
// DOM
// =============================================================================

pub struct FakeElement {
    pub tag: String,
    pub id: String,
    pub name: Option<String>,
    pub text: Option<String>,
    pub input_type: Option<String>,
    pub onclick: bool,
    listeners: Mutex<Vec<(InteractionKind, Listener)>>,
}

impl FakeElement {
    pub fn new(tag: &str, id: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: id.to_string(),
            name: None,
            text: None,
            input_type: None,
            onclick: false,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_input_type(mut self, input_type: &str) -> Self {
        self.input_type = Some(input_type.to_string());
        self
    }

    pub fn with_onclick(mut self) -> Self {
        self.onclick = true;
        self
    }

    /// Kinds that have at least one listener bound, in binding order.
    pub fn bound_kinds(&self) -> Vec<InteractionKind> {
        self.listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Fires `kind` at this element, invoking every listener bound for it.
    pub fn dispatch(self: &Arc<Self>, kind: InteractionKind) {
        let event = DomEvent::new(Arc::clone(self) as Arc<dyn EventTarget>);
        let listeners = self.listeners.lock().unwrap();
        for (bound, listener) in listeners.iter() {
            if *bound == kind {
                listener(&event);
            }
        }
    }
}

impl EventTarget for FakeElement {
    fn class_name(&self) -> String {
        format!("fake {}", self.tag)
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn text_content(&self) -> Option<String> {
        self.text.clone()
    }

    fn local_name(&self) -> String {
        self.tag.clone()
    }

    fn node_name(&self) -> String {
        self.tag.to_uppercase()
    }
}

impl Element for FakeElement {
    fn input_type(&self) -> Option<String> {
        self.input_type.clone()
    }

    fn has_click_property(&self) -> bool {
        self.onclick
    }

    fn add_event_listener(&self, kind: InteractionKind, listener: Listener) {
        self.listeners.lock().unwrap().push((kind, listener));
    }
}

#[derive(Default)]
pub struct FakeDocument {
    elements: Mutex<Vec<Arc<FakeElement>>>,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element and returns a handle for dispatching events to it.
    pub fn add(&self, element: FakeElement) -> Arc<FakeElement> {
        let element = Arc::new(element);
        self.elements.lock().unwrap().push(Arc::clone(&element));
        element
    }
}

impl Document for FakeDocument {
    fn query_selector_all(&self, selector: &str) -> Vec<Arc<dyn Element>> {
        self.elements
            .lock()
            .unwrap()
            .iter()
            .filter(|element| element.tag == selector)
            .map(|element| Arc::clone(element) as Arc<dyn Element>)
            .collect()
    }
}

// =============================================================================
// Performance timeline
// =============================================================================

pub struct FakeTimeline {
    time_origin: f64,
    observers: Mutex<Vec<(Vec<EntryKind>, EntryCallback)>>,
}

impl FakeTimeline {
    pub fn new(time_origin: f64) -> Self {
        Self {
            time_origin,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn observed_kinds(&self) -> Vec<Vec<EntryKind>> {
        self.observers
            .lock()
            .unwrap()
            .iter()
            .map(|(kinds, _)| kinds.clone())
            .collect()
    }

    /// Delivers one entry list to every observer.
    pub fn emit(&self, entries: &[PerformanceEntry]) {
        for (_, callback) in self.observers.lock().unwrap().iter() {
            callback(entries);
        }
    }
}

impl PerformanceTimeline for FakeTimeline {
    fn time_origin(&self) -> f64 {
        self.time_origin
    }

    fn observe(&self, kinds: &[EntryKind], callback: EntryCallback) {
        self.observers
            .lock()
            .unwrap()
            .push((kinds.to_vec(), callback));
    }
}

pub fn resource_entry(url: &str) -> PerformanceEntry {
    PerformanceEntry {
        entry_type: "resource".to_string(),
        name: url.to_string(),
        start_time: 12.0,
        duration: 30.0,
        resource: Some(ResourceTiming {
            fetch_start: 12.0,
            response_end: 42.0,
            transfer_size: 512.0,
            next_hop_protocol: "h2".to_string(),
            initiator_type: "fetch".to_string(),
            ..ResourceTiming::default()
        }),
    }
}

pub fn paint_entry() -> PerformanceEntry {
    PerformanceEntry {
        entry_type: "paint".to_string(),
        name: "first-paint".to_string(),
        start_time: 5.0,
        duration: 0.0,
        resource: None,
    }
}

// =============================================================================
// Session ids and store
// =============================================================================

/// Generates `session-0`, `session-1`, ...
#[derive(Default)]
pub struct SequentialIds(AtomicUsize);

impl SessionIdGenerator for SequentialIds {
    fn generate(&self) -> String {
        format!("session-{}", self.0.fetch_add(1, Ordering::SeqCst))
    }
}

/// Store that records every call instead of persisting.
#[derive(Default)]
pub struct RecordingStore {
    pub syncs: Mutex<Vec<(String, f64)>>,
    pub uploads: Mutex<Vec<(String, Vec<RecordedEvent>)>>,
    pub upload_threads: Mutex<Vec<ThreadId>>,
}

impl RecordingStore {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

impl PersistenceStore for RecordingStore {
    fn sync_time_origin(&self, session_id: &str, time_origin: f64) -> Result<(), PersistenceError> {
        self.syncs
            .lock()
            .unwrap()
            .push((session_id.to_string(), time_origin));
        Ok(())
    }

    fn upload_events(&self, session_id: &str, batch: &[RecordedEvent]) -> Result<(), PersistenceError> {
        self.upload_threads.lock().unwrap().push(thread::current().id());
        self.uploads
            .lock()
            .unwrap()
            .push((session_id.to_string(), batch.to_vec()));
        Ok(())
    }
}

// =============================================================================
// Log capture
// =============================================================================

/// Shared in-memory sink for `tracing` output.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a subscriber writing into the returned buffer.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}
