//! Append-only record of the messages exchanged in a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::roles::RoleKind;

/// One message in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// Role id of the sender, e.g. "coordinator".
    pub speaker_role_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered messages of one evaluation session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message stamped with the current time.
    pub fn push(&mut self, speaker: RoleKind, content: impl Into<String>) {
        let content = content.into();
        tracing::debug!(speaker = %speaker, chars = content.chars().count(), "Transcript append");
        self.messages.push(TranscriptMessage {
            speaker_role_id: speaker.id().to_string(),
            content,
            timestamp: Utc::now(),
        });
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message sent by `speaker`.
    pub fn last_from(&self, speaker: RoleKind) -> Option<&TranscriptMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.speaker_role_id == speaker.id())
    }
}
