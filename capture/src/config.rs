//! Configuration for capture sessions.
//!
//! Two layers of configuration exist:
//!
//! - [`TrackerConfig`] is fixed when the [`Tracker`](crate::session::Tracker)
//!   is built and holds the flush interval.
//! - [`InitOptions`] is supplied per session to
//!   [`Tracker::initialize`](crate::session::Tracker::initialize) and selects
//!   what gets tracked.
//!
//! # Options
//!
//! | Field | Default | Description |
//! |-------|---------|-------------|
//! | `skipUserInteractions` | `false` | Disable all DOM interaction tracking |
//! | `skipNetworkRequests` | `false` | Disable performance-timeline tracking |
//! | `trackInteractions` | `{}` | Per element kind: `"skip"` or a non-empty list of interactions |
//!
//! # Example
//!
//! ```
//! use shadow_capture::config::InitOptions;
//! use shadow_capture::interactions::TrackElement;
//! use shadow_capture::types::InteractionKind;
//!
//! let options = InitOptions::from_json(
//!     r#"{ "skipNetworkRequests": true, "trackInteractions": { "BUTTON": "skip", "ANCHOR": ["click"] } }"#,
//! )
//! .unwrap();
//!
//! assert!(options.skip_network_requests);
//! assert!(options.interactions_for(TrackElement::Button).is_none());
//! assert_eq!(
//!     options.interactions_for(TrackElement::Anchor).unwrap().into_iter().collect::<Vec<_>>(),
//!     vec![InteractionKind::Click],
//! );
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interactions::{InteractionSet, TrackElement};
use crate::types::InteractionKind;

/// Default interval between buffer flushes, in milliseconds.
pub const DEFAULT_UPLOAD_INTERVAL_MS: u64 = 10_000;

/// Default prefix for per-session storage keys.
pub const DEFAULT_KEY_PREFIX: &str = "shdw-events-";

/// Errors that can occur while building configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Options JSON could not be parsed.
    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How one element kind is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawElementTracking", into = "RawElementTracking")]
pub enum ElementTracking {
    /// Do not track this element kind at all.
    Skip,
    /// Track exactly these interactions instead of the defaults.
    Only(InteractionSet),
}

impl ElementTracking {
    /// Builds an override set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `kinds` is empty.
    pub fn only<I>(kinds: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = InteractionKind>,
    {
        let set: InteractionSet = kinds.into_iter().collect();
        if set.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "trackInteractions".to_string(),
                message: "override set must name at least one interaction".to_string(),
            });
        }
        Ok(Self::Only(set))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SkipKeyword {
    Skip,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawElementTracking {
    Keyword(SkipKeyword),
    Kinds(Vec<InteractionKind>),
}

impl TryFrom<RawElementTracking> for ElementTracking {
    type Error = ConfigError;

    fn try_from(raw: RawElementTracking) -> Result<Self, Self::Error> {
        match raw {
            RawElementTracking::Keyword(SkipKeyword::Skip) => Ok(Self::Skip),
            RawElementTracking::Kinds(kinds) => Self::only(kinds),
        }
    }
}

impl From<ElementTracking> for RawElementTracking {
    fn from(tracking: ElementTracking) -> Self {
        match tracking {
            ElementTracking::Skip => Self::Keyword(SkipKeyword::Skip),
            ElementTracking::Only(kinds) => Self::Kinds(kinds.into_iter().collect()),
        }
    }
}

/// Per-session tracking options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitOptions {
    /// Disables DOM interaction tracking entirely.
    pub skip_user_interactions: bool,

    /// Disables performance-timeline tracking entirely.
    pub skip_network_requests: bool,

    /// Per-element overrides. Element kinds without an entry use their
    /// handler's default interactions.
    pub track_interactions: BTreeMap<TrackElement, ElementTracking>,
}

impl InitOptions {
    /// Parses options from their JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` if the JSON is malformed, names an unknown
    /// element or interaction, or contains an empty override list.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn skip_user_interactions(mut self, skip: bool) -> Self {
        self.skip_user_interactions = skip;
        self
    }

    #[must_use]
    pub fn skip_network_requests(mut self, skip: bool) -> Self {
        self.skip_network_requests = skip;
        self
    }

    /// Sets the tracking override for one element kind.
    #[must_use]
    pub fn track(mut self, element: TrackElement, tracking: ElementTracking) -> Self {
        self.track_interactions.insert(element, tracking);
        self
    }

    /// Resolves the interactions to track for `element`.
    ///
    /// Returns `None` when the element kind is skipped.
    #[must_use]
    pub fn interactions_for(&self, element: TrackElement) -> Option<InteractionSet> {
        match self.track_interactions.get(&element) {
            Some(ElementTracking::Skip) => None,
            Some(ElementTracking::Only(kinds)) => Some(kinds.clone()),
            None => Some(element.handler().default_interactions()),
        }
    }
}

/// Settings shared by every session a tracker starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Time between buffer flushes.
    pub upload_interval: Duration,
}

impl TrackerConfig {
    /// Creates a validated tracker configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the interval is zero.
    pub fn new(upload_interval: Duration) -> Result<Self, ConfigError> {
        if upload_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "upload_interval".to_string(),
                message: "upload interval must be greater than 0".to_string(),
            });
        }
        Ok(Self { upload_interval })
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            upload_interval: Duration::from_millis(DEFAULT_UPLOAD_INTERVAL_MS),
        }
    }
}
