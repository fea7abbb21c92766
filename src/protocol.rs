/// Wire contract for machine consumers.
///
/// With `streaming.wire_updates` on, the binary emits one JSON-encoded
/// `TranscriptUpdate` per line on stdout: an ordered sequence of updates
/// tagged partial or final, mirroring the pending/confirmed split. Only the
/// message shapes and revision bookkeeping live here; a remote transport
/// carrying the same messages is a separate concern.
use serde::{Deserialize, Serialize};

use crate::coordinator::TranscriptEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Still revisable; a later update may replace this text.
    Partial,
    /// Confirmed; later updates only ever extend past it.
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptUpdate {
    pub session: u64,
    /// Strictly increasing per session so a client can discard reordered
    /// or duplicate deliveries.
    pub revision: u64,
    pub kind: UpdateKind,
    pub text: String,
}

/// Assigns revisions and maps coordinator events onto wire updates.
#[derive(Debug)]
pub struct UpdateStream {
    session: u64,
    next_revision: u64,
}

impl UpdateStream {
    pub fn new(session: u64) -> Self {
        UpdateStream {
            session,
            next_revision: 0,
        }
    }

    pub fn update(&mut self, event: &TranscriptEvent) -> TranscriptUpdate {
        let (kind, text) = match event {
            TranscriptEvent::Confirmed { text } => (UpdateKind::Final, text.clone()),
            TranscriptEvent::Pending { text } => (UpdateKind::Partial, text.clone()),
            TranscriptEvent::Finished { text } => (UpdateKind::Final, text.clone()),
        };

        let revision = self.next_revision;
        self.next_revision += 1;

        TranscriptUpdate {
            session: self.session,
            revision,
            kind,
            text,
        }
    }
}
