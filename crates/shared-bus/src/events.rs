//! # Topic Message Filters
//!
//! The bus carries every consensus-ordered `TopicMessage`; a `TopicFilter`
//! selects the ones a subscriber is interested in.

use serde::{Deserialize, Serialize};
use shared_types::{ConsensusTimestamp, TopicId, TopicMessage};

/// Selects topic messages by topic and consensus-time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<TopicId>,
    /// Inclusive lower bound on consensus timestamp.
    pub start_time: Option<ConsensusTimestamp>,
    /// Exclusive upper bound on consensus timestamp.
    pub end_time: Option<ConsensusTimestamp>,
}

impl TopicFilter {
    /// Create a filter that accepts all messages.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for a single topic.
    #[must_use]
    pub fn topic(topic_id: TopicId) -> Self {
        Self {
            topics: vec![topic_id],
            ..Self::default()
        }
    }

    /// Restrict to messages at or after `start`.
    #[must_use]
    pub fn starting_at(mut self, start: ConsensusTimestamp) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Restrict to messages strictly before `end`.
    #[must_use]
    pub fn ending_at(mut self, end: ConsensusTimestamp) -> Self {
        self.end_time = Some(end);
        self
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &TopicMessage) -> bool {
        let topic_match = self.topics.is_empty() || self.topics.contains(&message.topic_id);

        let after_start = self
            .start_time
            .map_or(true, |start| message.consensus_timestamp >= start);

        let before_end = self
            .end_time
            .map_or(true, |end| message.consensus_timestamp < end);

        topic_match && after_start && before_end
    }
}
