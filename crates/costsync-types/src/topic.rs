//! Hierarchical topic keys.
//!
//! A [`Topic`] is an immutable string identifier whose segments are
//! separated by [`TOPIC_DELIMITER`]. Topics are used both as subscription
//! filters and as routing keys into the store. They are never parsed into a
//! typed schema -- routing works by substring containment, so the wrapper
//! stays deliberately thin.

use serde::{Deserialize, Serialize};

/// Segment separator inside a topic path, e.g. `CostSync/State/Rate_Cards`.
pub const TOPIC_DELIMITER: char = '/';

/// An immutable hierarchical topic key.
///
/// By convention the external backend publishes state on topics with a
/// `State` segment and accepts commands on topics with an `Action` segment.
/// The core does not enforce that convention.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Wrap a topic string.
    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// The full topic string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the delimiter-separated segments of the topic.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(TOPIC_DELIMITER)
    }

    /// Whether the topic contains the given substring anywhere in its path.
    ///
    /// This is the matching primitive the classifier is built on.
    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }

    /// Consume the wrapper and return the owned topic string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Topic {
    fn from(topic: &str) -> Self {
        Self(topic.to_owned())
    }
}

impl From<String> for Topic {
    fn from(topic: String) -> Self {
        Self(topic)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn segments_split_on_delimiter() {
        let topic = Topic::from("CostSync/State/Rate_Cards");
        let segments: Vec<&str> = topic.segments().collect();
        assert_eq!(segments, vec!["CostSync", "State", "Rate_Cards"]);
    }

    #[test]
    fn contains_matches_inner_segment() {
        let topic = Topic::from("CostSync/State/Rate_Cards");
        assert!(topic.contains("Rate_Cards"));
        assert!(topic.contains("/State/"));
        assert!(!topic.contains("Action"));
    }

    #[test]
    fn serde_is_transparent() {
        let topic = Topic::from("A/B/C");
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(json, "\"A/B/C\"");
    }
}
