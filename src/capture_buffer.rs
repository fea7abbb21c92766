/// Single-owner capture buffer shared between the device callback and the
/// recognition coordinator.
///
/// The device thread appends frames; the coordinator reads them by cursor
/// without removing anything (it needs replay access to recompute windows).
/// There is exactly one copy of captured audio per session: this buffer.
/// Dropping a frame from an active session is an invariant violation, never
/// a tolerated steady state, so `push` fails loudly instead of shedding
/// load.
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::SessionError;
use crate::frame::AudioFrame;

/// Initial allocation, grown on demand up to the hard ceiling.
const SOFT_CAPACITY_FRAMES: usize = 256;

struct Inner {
    frames: Vec<AudioFrame>,
    /// Sum of sample counts across all frames, kept incrementally so
    /// total_duration() doesn't walk the frame list under the lock.
    total_samples: usize,
    /// Sequence number the next pushed frame must carry.
    next_sequence: u64,
    /// Set when the session stops accepting frames (flush complete or abort).
    closed: bool,
}

pub struct CaptureBuffer {
    inner: Mutex<Inner>,
    audio_available: Condvar,
    sample_rate: u32,
    /// Hard ceiling in samples, derived from the maximum session duration.
    max_samples: usize,
    max_session_secs: u64,
}

impl CaptureBuffer {
    pub fn new(sample_rate: u32, max_session_secs: u64) -> Self {
        CaptureBuffer {
            inner: Mutex::new(Inner {
                frames: Vec::with_capacity(SOFT_CAPACITY_FRAMES),
                total_samples: 0,
                next_sequence: 0,
                closed: false,
            }),
            audio_available: Condvar::new(),
            sample_rate,
            max_samples: sample_rate as usize * max_session_secs as usize,
            max_session_secs,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Append a frame from the device thread.
    ///
    /// Rejects out-of-order sequence numbers (`AudioGap`) and refuses to
    /// grow past the hard ceiling (`SessionTooLong`). Both are fatal to the
    /// session; neither is ever absorbed silently.
    pub fn push(&self, frame: AudioFrame) -> Result<(), SessionError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| SessionError::AudioDevice("capture buffer lock poisoned".into()))?;

        if inner.closed {
            // Frames produced after close belong to no session; the device
            // thread races the state machine here, so this is not an error.
            return Ok(());
        }

        if frame.sequence != inner.next_sequence {
            return Err(SessionError::AudioGap {
                expected: inner.next_sequence,
                got: frame.sequence,
            });
        }

        if inner.total_samples + frame.len() > self.max_samples {
            return Err(SessionError::SessionTooLong {
                max_secs: self.max_session_secs,
            });
        }

        // Grow in soft-capacity steps so the audio callback never pays for
        // an element-at-a-time reallocation pattern.
        if inner.frames.len() == inner.frames.capacity() {
            inner.frames.reserve(SOFT_CAPACITY_FRAMES);
        }

        inner.total_samples += frame.len();
        inner.next_sequence += 1;
        inner.frames.push(frame);

        self.audio_available.notify_all();
        Ok(())
    }

    /// Return clones of every frame with sequence >= cursor, plus the new
    /// cursor. Non-destructive: the buffer retains everything until the
    /// session is destroyed, because the coordinator re-reads audio when it
    /// recomputes recognition windows.
    pub fn drain_from(&self, cursor: u64) -> (Vec<AudioFrame>, u64) {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return (Vec::new(), cursor),
        };

        let start = cursor.min(inner.next_sequence) as usize;
        let frames = inner.frames[start..].to_vec();
        (frames, inner.next_sequence)
    }

    /// Total captured audio so far, derived from sample counts.
    pub fn total_duration(&self) -> Duration {
        let samples = match self.inner.lock() {
            Ok(inner) => inner.total_samples,
            Err(_) => 0,
        };
        Duration::from_secs_f64(samples as f64 / self.sample_rate as f64)
    }

    pub fn frame_count(&self) -> u64 {
        match self.inner.lock() {
            Ok(inner) => inner.next_sequence,
            Err(_) => 0,
        }
    }

    /// Block until at least `min_samples` of audio exist beyond `cursor`,
    /// the buffer is closed, or the timeout expires. Returns true if new
    /// audio (or close) is available.
    ///
    /// This is the coordinator's only suspension point on the audio side:
    /// the device thread signals the condvar on every push.
    pub fn wait_new_audio(&self, cursor: u64, min_samples: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };

        loop {
            let pending: usize = inner.frames[(cursor.min(inner.next_sequence) as usize)..]
                .iter()
                .map(|f| f.len())
                .sum();
            if pending >= min_samples || inner.closed {
                return pending > 0 || inner.closed;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let (guard, res) = match self.audio_available.wait_timeout(inner, deadline - now) {
                Ok(r) => r,
                Err(_) => return false,
            };
            inner = guard;
            if res.timed_out() {
                let pending: usize = inner.frames[(cursor.min(inner.next_sequence) as usize)..]
                    .iter()
                    .map(|f| f.len())
                    .sum();
                return pending >= min_samples || inner.closed;
            }
        }
    }

    /// Stop accepting frames. Called once the flush grace period ends, and
    /// on every abort path. Wakes any waiting reader.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
        self.audio_available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.closed,
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64, samples: usize) -> AudioFrame {
        AudioFrame::new(16000, seq, vec![0.1; samples])
    }

    #[test]
    fn test_push_and_drain_preserves_every_frame() {
        let buffer = CaptureBuffer::new(16000, 120);
        for seq in 0..10 {
            buffer.push(frame(seq, 160)).unwrap();
        }

        let (frames, cursor) = buffer.drain_from(0);
        assert_eq!(cursor, 10);
        let sequences: Vec<u64> = frames.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_drain_is_non_destructive() {
        let buffer = CaptureBuffer::new(16000, 120);
        for seq in 0..5 {
            buffer.push(frame(seq, 160)).unwrap();
        }

        let (first, _) = buffer.drain_from(0);
        let (second, _) = buffer.drain_from(0);
        assert_eq!(first.len(), second.len());

        let (tail, cursor) = buffer.drain_from(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(cursor, 5);
    }

    #[test]
    fn test_gap_detection() {
        let buffer = CaptureBuffer::new(16000, 120);
        buffer.push(frame(0, 160)).unwrap();
        buffer.push(frame(1, 160)).unwrap();

        let err = buffer.push(frame(3, 160)).unwrap_err();
        match err {
            SessionError::AudioGap { expected, got } => {
                assert_eq!(expected, 2);
                assert_eq!(got, 3);
            }
            other => panic!("expected AudioGap, got {:?}", other),
        }
    }

    #[test]
    fn test_hard_ceiling() {
        // 1 second ceiling at 16kHz = 16000 samples
        let buffer = CaptureBuffer::new(16000, 1);
        buffer.push(frame(0, 12000)).unwrap();

        let err = buffer.push(frame(1, 8000)).unwrap_err();
        assert!(matches!(err, SessionError::SessionTooLong { max_secs: 1 }));
    }

    #[test]
    fn test_total_duration() {
        let buffer = CaptureBuffer::new(16000, 120);
        buffer.push(frame(0, 16000)).unwrap();
        buffer.push(frame(1, 8000)).unwrap();
        assert_eq!(buffer.total_duration(), Duration::from_millis(1500));
    }

    #[test]
    fn test_push_after_close_is_ignored() {
        let buffer = CaptureBuffer::new(16000, 120);
        buffer.push(frame(0, 160)).unwrap();
        buffer.close();

        buffer.push(frame(1, 160)).unwrap();
        assert_eq!(buffer.frame_count(), 1);
    }

    #[test]
    fn test_wait_new_audio_returns_on_close() {
        let buffer = CaptureBuffer::new(16000, 120);
        buffer.close();
        assert!(buffer.wait_new_audio(0, 16000, Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_new_audio_times_out() {
        let buffer = CaptureBuffer::new(16000, 120);
        assert!(!buffer.wait_new_audio(0, 16000, Duration::from_millis(10)));
    }

    #[test]
    fn test_concurrent_append_while_reading() {
        use std::sync::Arc;
        use std::thread;

        let buffer = Arc::new(CaptureBuffer::new(16000, 120));
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for seq in 0..100 {
                    buffer.push(frame(seq, 160)).unwrap();
                }
                buffer.close();
            })
        };

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            buffer.wait_new_audio(cursor, 160, Duration::from_secs(1));
            let (frames, new_cursor) = buffer.drain_from(cursor);
            seen.extend(frames.iter().map(|f| f.sequence));
            cursor = new_cursor;
            if buffer.is_closed() && cursor == buffer.frame_count() {
                break;
            }
        }
        producer.join().unwrap();

        assert_eq!(seen, (0..100).collect::<Vec<u64>>());
    }
}
