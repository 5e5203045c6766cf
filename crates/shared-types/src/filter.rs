//! # Subscription Filter
//!
//! Predicate over event type (with trailing-wildcard prefix matching) and
//! event source. An empty filter matches everything.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Filter attached to one subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Type patterns. Empty means all types.
    #[serde(default)]
    pub event_types: BTreeSet<String>,
    /// Exact source names. Empty means all sources.
    #[serde(default)]
    pub sources: BTreeSet<String>,
}

impl SubscriptionFilter {
    /// A filter that accepts every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on type patterns only.
    #[must_use]
    pub fn event_types<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_types: patterns.into_iter().map(Into::into).collect(),
            sources: BTreeSet::new(),
        }
    }

    /// Filter on sources only.
    #[must_use]
    pub fn sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_types: BTreeSet::new(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a filter from the raw comma-separated request parameters.
    ///
    /// Entries are trimmed; empty entries are ignored, so a malformed
    /// parameter degrades to "no restriction" instead of an error.
    #[must_use]
    pub fn parse(event_types: Option<&str>, sources: Option<&str>) -> Self {
        Self {
            event_types: split_list(event_types),
            sources: split_list(sources),
        }
    }

    /// True when neither types nor sources are restricted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event_types.is_empty() && self.sources.is_empty()
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let type_match = self.event_types.is_empty()
            || self
                .event_types
                .iter()
                .any(|pattern| type_matches(pattern, &event.event_type));

        let source_match = self.sources.is_empty() || self.sources.contains(&event.source);

        type_match && source_match
    }
}

/// `*` matches everything, `prefix*` matches by prefix, anything else is exact.
fn type_matches(pattern: &str, event_type: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => event_type.starts_with(prefix),
        None => pattern == event_type,
    }
}

fn split_list(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
