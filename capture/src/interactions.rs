//! DOM interaction tracking.
//!
//! Each [`TrackElement`] kind has an [`ElementHandler`] that knows how to find
//! elements of that kind in a [`Document`] and which interactions to listen for
//! by default. Discovery runs once, when a session is initialized; elements
//! added to the page afterwards are never tracked.
//!
//! The DOM itself is an external collaborator, reached only through the
//! [`Document`], [`Element`] and [`EventTarget`] traits.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{InteractionKind, InteractionTarget, RecordedEvent};

/// Set of interaction kinds tracked for an element kind.
pub type InteractionSet = BTreeSet<InteractionKind>;

/// Listener bound to an element for one interaction kind.
pub type Listener = Box<dyn Fn(&DomEvent) + Send + Sync>;

/// Element kinds that can be tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackElement {
    Button,
    Div,
    Anchor,
    Textbox,
    Select,
}

impl TrackElement {
    /// Every trackable element kind, in setup order.
    pub const ALL: [TrackElement; 5] = [
        TrackElement::Button,
        TrackElement::Div,
        TrackElement::Anchor,
        TrackElement::Textbox,
        TrackElement::Select,
    ];

    /// Returns the handler for this element kind.
    #[must_use]
    pub fn handler(self) -> &'static dyn ElementHandler {
        match self {
            Self::Button => &ButtonHandler,
            Self::Div => &DivHandler,
            Self::Anchor => &AnchorHandler,
            Self::Textbox => &TextboxHandler,
            Self::Select => &SelectHandler,
        }
    }
}

/// Read access to the attributes of an interaction target.
pub trait EventTarget: Send + Sync {
    /// Space-separated class list.
    fn class_name(&self) -> String;

    fn id(&self) -> String;

    /// Value of the `name` attribute, or `None` for elements without one.
    fn name(&self) -> Option<String>;

    /// Text content of the element and its descendants, if any.
    fn text_content(&self) -> Option<String>;

    fn local_name(&self) -> String;

    fn node_name(&self) -> String;
}

/// A DOM element that interactions can be bound to.
pub trait Element: EventTarget {
    /// The `type` property of `input` elements; `None` for other elements.
    fn input_type(&self) -> Option<String>;

    /// True when a click handler was assigned through the element's `onclick`
    /// property. Handlers added with `addEventListener` are not visible here.
    fn has_click_property(&self) -> bool;

    /// Registers `listener` for the given interaction.
    fn add_event_listener(&self, kind: InteractionKind, listener: Listener);
}

/// The page document.
pub trait Document: Send + Sync {
    /// Returns the elements currently matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<Arc<dyn Element>>;
}

/// An interaction delivered to a listener.
#[derive(Clone)]
pub struct DomEvent {
    pub target: Arc<dyn EventTarget>,
}

impl DomEvent {
    #[must_use]
    pub fn new(target: Arc<dyn EventTarget>) -> Self {
        Self { target }
    }
}

impl std::fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomEvent")
            .field("target", &self.target.node_name())
            .finish()
    }
}

/// Discovery and defaults for one kind of trackable element.
pub trait ElementHandler: Send + Sync {
    /// Interactions tracked when the caller does not override them.
    fn default_interactions(&self) -> InteractionSet;

    /// Finds the elements of this kind currently present in `document`.
    fn discover(&self, document: &dyn Document) -> Vec<Arc<dyn Element>>;
}

fn pointer_interactions() -> InteractionSet {
    BTreeSet::from([InteractionKind::Click, InteractionKind::MouseEnter])
}

fn input_interactions() -> InteractionSet {
    BTreeSet::from([InteractionKind::Click, InteractionKind::KeyDown])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonHandler;

impl ElementHandler for ButtonHandler {
    fn default_interactions(&self) -> InteractionSet {
        pointer_interactions()
    }

    fn discover(&self, document: &dyn Document) -> Vec<Arc<dyn Element>> {
        document.query_selector_all("button")
    }
}

/// Handler for clickable `div`s.
///
/// Only divs whose click handler was assigned through the `onclick` property
/// are discovered; divs wired up with `addEventListener` stay invisible.
#[derive(Debug, Clone, Copy, Default)]
pub struct DivHandler;

impl ElementHandler for DivHandler {
    fn default_interactions(&self) -> InteractionSet {
        pointer_interactions()
    }

    fn discover(&self, document: &dyn Document) -> Vec<Arc<dyn Element>> {
        document
            .query_selector_all("div")
            .into_iter()
            .filter(|element| {
                let clickable = element.has_click_property();
                if clickable {
                    debug!(id = %element.id(), "Found div with onclick property");
                }
                clickable
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorHandler;

impl ElementHandler for AnchorHandler {
    fn default_interactions(&self) -> InteractionSet {
        pointer_interactions()
    }

    fn discover(&self, document: &dyn Document) -> Vec<Arc<dyn Element>> {
        document.query_selector_all("a")
    }
}

/// Handler for single-line text inputs (`<input type="text">`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TextboxHandler;

impl ElementHandler for TextboxHandler {
    fn default_interactions(&self) -> InteractionSet {
        input_interactions()
    }

    fn discover(&self, document: &dyn Document) -> Vec<Arc<dyn Element>> {
        document
            .query_selector_all("input")
            .into_iter()
            .filter(|element| element.input_type().as_deref() == Some("text"))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectHandler;

impl ElementHandler for SelectHandler {
    fn default_interactions(&self) -> InteractionSet {
        input_interactions()
    }

    fn discover(&self, document: &dyn Document) -> Vec<Arc<dyn Element>> {
        document.query_selector_all("select")
    }
}

impl InteractionTarget {
    /// Captures the current attributes of `target`.
    ///
    /// Targets without a `name` attribute, or without text content, snapshot
    /// those fields as empty strings.
    #[must_use]
    pub fn snapshot(target: &dyn EventTarget) -> Self {
        Self {
            class_names: target.class_name(),
            id: target.id(),
            name: target.name().unwrap_or_default(),
            inner_text: target.text_content().unwrap_or_default(),
            local_name: target.local_name(),
            node_name: target.node_name(),
        }
    }
}

/// Translates a delivered DOM event into a recorded interaction.
#[must_use]
pub fn translate(event: &DomEvent, kind: InteractionKind) -> RecordedEvent {
    RecordedEvent::user_interaction(kind, InteractionTarget::snapshot(event.target.as_ref()))
}
