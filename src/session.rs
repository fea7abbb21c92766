/// Hold-to-talk session state machine.
///
/// Pure transition logic, no I/O: hotkey press/release and completion
/// signals come in, orchestration actions come out. This keeps the
/// hold-to-talk semantics testable with synthetic events instead of real
/// hotkey hardware.
use std::time::Instant;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No capture active.
    Idle,
    /// Hotkey pressed; waiting for device acquisition to succeed.
    Armed,
    /// Device pushing frames into the capture buffer.
    Recording,
    /// Hotkey released; draining device frames for the grace period.
    Flushing,
    /// Final recognition pass over remaining unconfirmed audio.
    Processing,
    /// Session ended with an error; partial transcript still delivered.
    Aborted,
}

/// What the orchestrator should do after a transition.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Open the audio device and start the capture stream.
    AcquireDevice,
    /// Stop capture after the flush grace period, then finalize.
    BeginFlush,
    /// Nothing to do (idempotent event).
    None,
}

/// One hotkey-press-to-release unit of capture work. Exactly one exists at
/// a time; created on Idle -> Armed, destroyed on return to Idle.
#[derive(Debug)]
pub struct RecordingSession {
    pub id: u64,
    pub started_at: Instant,
    pub frame_count: u64,
}

#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
    session: Option<RecordingSession>,
    next_session_id: u64,
    last_error: Option<SessionError>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        SessionStateMachine {
            state: SessionState::Idle,
            session: None,
            next_session_id: 1,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// Feed a hotkey event. Press while Flushing/Processing is rejected
    /// with Busy (never queued); press while already Recording and release
    /// while Idle are no-ops.
    pub fn on_hotkey(&mut self, event: HotkeyEvent) -> Result<SessionAction, SessionError> {
        match (self.state, event) {
            (SessionState::Idle, HotkeyEvent::Pressed) => {
                let id = self.next_session_id;
                self.next_session_id += 1;
                self.session = Some(RecordingSession {
                    id,
                    started_at: Instant::now(),
                    frame_count: 0,
                });
                self.last_error = None;
                self.state = SessionState::Armed;
                Ok(SessionAction::AcquireDevice)
            }
            (SessionState::Armed | SessionState::Recording, HotkeyEvent::Pressed) => {
                Ok(SessionAction::None)
            }
            (SessionState::Flushing | SessionState::Processing, HotkeyEvent::Pressed) => {
                Err(SessionError::Busy)
            }
            (SessionState::Aborted, HotkeyEvent::Pressed) => {
                // A stale abort doesn't block the next session.
                self.reset();
                self.on_hotkey(HotkeyEvent::Pressed)
            }
            (SessionState::Armed | SessionState::Recording, HotkeyEvent::Released) => {
                self.state = SessionState::Flushing;
                Ok(SessionAction::BeginFlush)
            }
            (_, HotkeyEvent::Released) => Ok(SessionAction::None),
        }
    }

    /// Device acquisition succeeded; frames are flowing.
    pub fn device_acquired(&mut self) {
        if self.state == SessionState::Armed {
            self.state = SessionState::Recording;
        }
    }

    /// Device acquisition failed; the session aborts.
    pub fn device_failed(&mut self, reason: String) {
        if self.state == SessionState::Armed {
            self.abort(SessionError::AudioDevice(reason));
        }
    }

    /// Flush grace period elapsed; the final recognition pass may run.
    pub fn flush_complete(&mut self) {
        if self.state == SessionState::Flushing {
            self.state = SessionState::Processing;
        }
    }

    /// Final pass done; the session is destroyed.
    pub fn processing_complete(&mut self) {
        if self.state == SessionState::Processing {
            self.state = SessionState::Idle;
            self.session = None;
        }
    }

    /// Terminate the session from any non-Idle state. The caller must still
    /// deliver whatever confirmed transcript exists.
    pub fn abort(&mut self, error: SessionError) {
        if self.state != SessionState::Idle {
            self.state = SessionState::Aborted;
            self.session = None;
            self.last_error = Some(error);
        }
    }

    /// Acknowledge an abort and return to Idle.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.session = None;
    }

    /// Record the capture buffer's frame total for the active session. The
    /// buffer is the source of truth; this is a snapshot, not a delta.
    pub fn set_frame_count(&mut self, count: u64) {
        if let Some(session) = self.session.as_mut() {
            session.frame_count = count;
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        SessionStateMachine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_machine() -> SessionStateMachine {
        let mut machine = SessionStateMachine::new();
        machine.on_hotkey(HotkeyEvent::Pressed).unwrap();
        machine.device_acquired();
        machine
    }

    #[test]
    fn test_press_starts_session() {
        let mut machine = SessionStateMachine::new();
        let action = machine.on_hotkey(HotkeyEvent::Pressed).unwrap();
        assert_eq!(action, SessionAction::AcquireDevice);
        assert_eq!(machine.state(), SessionState::Armed);
        assert!(machine.session().is_some());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut machine = recording_machine();
        assert_eq!(machine.state(), SessionState::Recording);

        let action = machine.on_hotkey(HotkeyEvent::Released).unwrap();
        assert_eq!(action, SessionAction::BeginFlush);
        assert_eq!(machine.state(), SessionState::Flushing);

        machine.flush_complete();
        assert_eq!(machine.state(), SessionState::Processing);

        machine.processing_complete();
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(machine.session().is_none());
    }

    #[test]
    fn test_press_while_recording_is_noop() {
        let mut machine = recording_machine();
        let id_before = machine.session().unwrap().id;

        let action = machine.on_hotkey(HotkeyEvent::Pressed).unwrap();
        assert_eq!(action, SessionAction::None);
        assert_eq!(machine.state(), SessionState::Recording);
        assert_eq!(machine.session().unwrap().id, id_before);
    }

    #[test]
    fn test_release_while_idle_is_noop() {
        let mut machine = SessionStateMachine::new();
        let action = machine.on_hotkey(HotkeyEvent::Released).unwrap();
        assert_eq!(action, SessionAction::None);
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn test_double_release_is_noop() {
        let mut machine = recording_machine();
        machine.on_hotkey(HotkeyEvent::Released).unwrap();
        assert_eq!(machine.state(), SessionState::Flushing);

        // Second release changes nothing; Flushing continues.
        let action = machine.on_hotkey(HotkeyEvent::Released).unwrap();
        assert_eq!(action, SessionAction::None);
        assert_eq!(machine.state(), SessionState::Flushing);
    }

    #[test]
    fn test_press_while_finalizing_is_busy() {
        let mut machine = recording_machine();
        machine.on_hotkey(HotkeyEvent::Released).unwrap();

        let err = machine.on_hotkey(HotkeyEvent::Pressed).unwrap_err();
        assert!(matches!(err, SessionError::Busy));
        assert_eq!(machine.state(), SessionState::Flushing);

        machine.flush_complete();
        let err = machine.on_hotkey(HotkeyEvent::Pressed).unwrap_err();
        assert!(matches!(err, SessionError::Busy));
        assert_eq!(machine.state(), SessionState::Processing);
    }

    #[test]
    fn test_device_failure_aborts() {
        let mut machine = SessionStateMachine::new();
        machine.on_hotkey(HotkeyEvent::Pressed).unwrap();
        machine.device_failed("no input device".into());

        assert_eq!(machine.state(), SessionState::Aborted);
        assert!(machine.session().is_none());
        assert!(matches!(
            machine.last_error(),
            Some(SessionError::AudioDevice(_))
        ));
    }

    #[test]
    fn test_press_after_abort_starts_fresh_session() {
        let mut machine = recording_machine();
        let first_id = machine.session().unwrap().id;
        machine.abort(SessionError::AudioGap { expected: 5, got: 7 });

        let action = machine.on_hotkey(HotkeyEvent::Pressed).unwrap();
        assert_eq!(action, SessionAction::AcquireDevice);
        assert!(machine.session().unwrap().id > first_id);
    }

    #[test]
    fn test_abort_from_idle_is_ignored() {
        let mut machine = SessionStateMachine::new();
        machine.abort(SessionError::Busy);
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn test_exactly_one_session_at_a_time() {
        let mut machine = recording_machine();
        let first_id = machine.session().unwrap().id;

        // Pressing again never creates a second session.
        machine.on_hotkey(HotkeyEvent::Pressed).unwrap();
        assert_eq!(machine.session().unwrap().id, first_id);
    }

    #[test]
    fn test_set_frame_count_tracks_buffer_total() {
        let mut machine = recording_machine();
        machine.set_frame_count(3);
        // A later snapshot replaces the earlier one.
        machine.set_frame_count(5);
        assert_eq!(machine.session().unwrap().frame_count, 5);
    }
}
