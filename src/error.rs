use thiserror::Error;

/// Errors that can end or reject a recording session.
///
/// The state machine and the coordinator both report failures through this
/// enum so callers can distinguish invariant violations (which always kill
/// the session) from transient recognition trouble (retried once first).
#[derive(Debug, Error)]
pub enum SessionError {
    /// Input device could not be acquired, or was lost mid-session.
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// The capture buffer hit its hard ceiling; the session must end rather
    /// than silently truncate audio.
    #[error("session exceeded maximum length ({max_secs}s of audio)")]
    SessionTooLong { max_secs: u64 },

    /// A frame sequence number was skipped. Audio was lost somewhere, which
    /// violates the no-drop invariant, so the session aborts.
    #[error("audio gap detected: expected frame {expected}, got {got}")]
    AudioGap { expected: u64, got: u64 },

    /// The recognition capability failed after its single retry.
    #[error("recognition failed: {0}")]
    Recognition(String),

    /// Hotkey pressed while a previous session is still finalizing.
    #[error("busy: previous session still finalizing")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = SessionError::AudioGap { expected: 2, got: 4 };
        assert_eq!(e.to_string(), "audio gap detected: expected frame 2, got 4");
    }
}
