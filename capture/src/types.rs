//! Event types for page telemetry capture.
//!
//! This module defines the shared event vocabulary produced by the capture
//! dispatchers and consumed by the session buffer and persistence store. All
//! types serialize to camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminant for recorded events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    UserInteraction,
    NetworkRequest,
}

/// Kinds of DOM interaction that can be tracked.
///
/// Ordering follows declaration order, so sets of interaction kinds iterate
/// click, mouse-enter, key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Click,
    #[serde(rename = "mouseenter")]
    MouseEnter,
    #[serde(rename = "keydown")]
    KeyDown,
}

impl InteractionKind {
    /// Returns the DOM event name for this interaction.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::MouseEnter => "mouseenter",
            Self::KeyDown => "keydown",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the element an interaction was dispatched to.
///
/// Captured when the listener runs; it never refers back to the live element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionTarget {
    pub class_names: String,
    pub id: String,
    pub name: String,
    pub inner_text: String,
    pub local_name: String,
    pub node_name: String,
}

/// Browser-reported timing marks for a single fetched resource.
///
/// If the resource is served from a different origin, most milestones read as
/// zero unless the response carries a `Timing-Allow-Origin` header. Values are
/// copied verbatim; durations such as DNS or TLS time are left to consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
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
    /// Protocol of the final hop, e.g. `h2` or `http/1.1`.
    pub next_hop_protocol: String,
    pub start_time: f64,
    pub duration: f64,
    /// Resource URL.
    pub name: String,
    pub initiator_type: String,
}

/// Payload variants for recorded events.
///
/// Uses serde's internally tagged representation; the tag doubles as the
/// event's [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum EventPayload {
    /// A tracked DOM interaction.
    UserInteraction {
        interaction_kind: InteractionKind,
        target: InteractionTarget,
    },
    /// A completed resource fetch observed on the performance timeline.
    NetworkRequest { network_request: NetworkRequest },
}

/// A captured telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    /// Wall-clock time at which the event was translated.
    pub recorded_at: DateTime<Utc>,

    /// Event-specific payload data.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl RecordedEvent {
    /// Creates a user-interaction event stamped with the current time.
    ///
    /// # Examples
    ///
    /// ```
    /// use shadow_capture::types::{EventKind, InteractionKind, InteractionTarget, RecordedEvent};
    ///
    /// let event = RecordedEvent::user_interaction(
    ///     InteractionKind::Click,
    ///     InteractionTarget::default(),
    /// );
    /// assert_eq!(event.kind(), EventKind::UserInteraction);
    /// ```
    #[must_use]
    pub fn user_interaction(interaction_kind: InteractionKind, target: InteractionTarget) -> Self {
        Self {
            recorded_at: Utc::now(),
            payload: EventPayload::UserInteraction {
                interaction_kind,
                target,
            },
        }
    }

    /// Creates a network-request event stamped with the current time.
    #[must_use]
    pub fn network_request(network_request: NetworkRequest) -> Self {
        Self {
            recorded_at: Utc::now(),
            payload: EventPayload::NetworkRequest { network_request },
        }
    }

    /// Returns the discriminant of this event's payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::UserInteraction { .. } => EventKind::UserInteraction,
            EventPayload::NetworkRequest { .. } => EventKind::NetworkRequest,
        }
    }
}
