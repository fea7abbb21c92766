/// Streaming recognition coordinator.
///
/// Drains the capture buffer on its own cadence, feeds growing windows of
/// unconfirmed audio to the recognition capability, and applies local
/// agreement to decide which transcript prefix is final. Recognition cost
/// is bounded by the unconfirmed tail, not total session length: confirmed
/// audio is never re-submitted.
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::capture_buffer::CaptureBuffer;
use crate::constants::coordinator::{RECOGNITION_RETRIES, WAIT_SLICE_MS};
use crate::error::SessionError;
use crate::frame::is_silence;
use crate::recognizer::Recognizer;
use crate::transcript::{ConfirmedTranscript, Hypothesis, PendingTail};

/// Transcript updates emitted while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// A newly confirmed segment (append-only; never revised).
    Confirmed { text: String },
    /// The current revisable tail. Replaces the previous pending text.
    Pending { text: String },
    /// Session finalized; the complete transcript.
    Finished { text: String },
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Run incremental passes while recording. When false, recognition
    /// happens once at finalization.
    pub streaming: bool,
    /// Minimum new audio before the next incremental pass.
    pub min_new_audio_ms: u64,
    /// Agreed words held back from confirmation until more context arrives.
    pub agreement_margin_words: usize,
    /// RMS silence threshold for skipping passes over speechless windows.
    pub silence_threshold: f32,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        CoordinatorOptions {
            streaming: true,
            min_new_audio_ms: 700,
            agreement_margin_words: 2,
            silence_threshold: 0.003,
        }
    }
}

pub struct StreamingCoordinator<R: Recognizer> {
    buffer: Arc<CaptureBuffer>,
    recognizer: R,
    options: CoordinatorOptions,
    /// Frame cursor into the capture buffer.
    cursor: u64,
    /// Unconfirmed audio, starting at the confirmed boundary.
    window: Vec<f32>,
    /// New samples accumulated since the last incremental pass.
    samples_since_pass: usize,
    confirmed: ConfirmedTranscript,
    pending: PendingTail,
}

impl<R: Recognizer> StreamingCoordinator<R> {
    pub fn new(buffer: Arc<CaptureBuffer>, recognizer: R, options: CoordinatorOptions) -> Self {
        StreamingCoordinator {
            buffer,
            recognizer,
            options,
            cursor: 0,
            window: Vec::new(),
            samples_since_pass: 0,
            confirmed: ConfirmedTranscript::new(),
            pending: PendingTail::new(),
        }
    }

    /// Text confirmed so far. Valid (and delivered) on every exit path,
    /// including aborts.
    pub fn confirmed_text(&self) -> String {
        self.confirmed.text()
    }

    /// Hand the recognizer back so the next session can reuse it without
    /// reloading the model.
    pub fn into_recognizer(self) -> R {
        self.recognizer
    }

    /// Consume buffered audio until the buffer closes, running incremental
    /// passes on the configured cadence, then finalize.
    ///
    /// Returns the full transcript. On error the caller still gets the
    /// partial transcript via `confirmed_text()`.
    pub fn run(&mut self, events: &Sender<TranscriptEvent>) -> Result<String, SessionError> {
        let min_samples = self.ms_to_samples(self.options.min_new_audio_ms);

        loop {
            self.buffer
                .wait_new_audio(self.cursor, min_samples, Duration::from_millis(WAIT_SLICE_MS));
            self.drain_new_frames();

            let closed = self.buffer.is_closed();
            let fully_drained = self.cursor == self.buffer.frame_count();

            if closed && fully_drained {
                return self.finalize(events);
            }

            if self.options.streaming && !closed && self.samples_since_pass >= min_samples {
                self.incremental_pass(events)?;
            }
        }
    }

    /// Pull every frame past the cursor into the window. The buffer keeps
    /// its copy; the window is the coordinator's working view of the
    /// unconfirmed tail.
    fn drain_new_frames(&mut self) {
        let (frames, new_cursor) = self.buffer.drain_from(self.cursor);
        for frame in &frames {
            self.window.extend_from_slice(&frame.samples);
            self.samples_since_pass += frame.len();
        }
        self.cursor = new_cursor;
    }

    fn incremental_pass(&mut self, events: &Sender<TranscriptEvent>) -> Result<(), SessionError> {
        self.samples_since_pass = 0;

        // A speechless window would only hallucinate; treat it like an
        // empty hypothesis and advance past it.
        if is_silence(&self.window, self.options.silence_threshold) {
            self.advance_window(None);
            return Ok(());
        }

        let hint = self.confirmed.text();
        let hypothesis = self.transcribe_with_retry(Some(&hint))?;

        if hypothesis.is_empty() {
            // Recognizer heard nothing; advance without promoting.
            self.advance_window(None);
            return Ok(());
        }

        let promotion = self
            .pending
            .apply(hypothesis, self.options.agreement_margin_words);

        if !promotion.confirmed.is_empty() {
            self.advance_window(promotion.confirmed_end_sample);
            self.confirmed.append(promotion.confirmed.clone());
            let _ = events.send(TranscriptEvent::Confirmed {
                text: promotion.confirmed,
            });
        }

        let _ = events.send(TranscriptEvent::Pending {
            text: self.pending.text(),
        });

        Ok(())
    }

    /// One last pass over all remaining unconfirmed audio with no safety
    /// margin, promoting everything.
    fn finalize(&mut self, events: &Sender<TranscriptEvent>) -> Result<String, SessionError> {
        if !self.window.is_empty() && !is_silence(&self.window, self.options.silence_threshold) {
            let hint = self.confirmed.text();
            let hypothesis = self.transcribe_with_retry(Some(&hint))?;
            let promotion = self.pending.finalize(hypothesis);
            if !promotion.confirmed.is_empty() {
                self.confirmed.append(promotion.confirmed.clone());
                let _ = events.send(TranscriptEvent::Confirmed {
                    text: promotion.confirmed,
                });
            }
        }
        self.window.clear();

        let text = self.confirmed.text();
        let _ = events.send(TranscriptEvent::Finished { text: text.clone() });
        Ok(text)
    }

    /// Drop confirmed audio from the front of the window. `None` means the
    /// window carried no confirmed words (silence or an empty hypothesis)
    /// and is consumed whole; a boundary keeps everything past it, even
    /// when every word was promoted.
    fn advance_window(&mut self, confirmed_end_sample: Option<usize>) {
        match confirmed_end_sample {
            Some(end) if end < self.window.len() => {
                self.window.drain(0..end);
            }
            _ => self.window.clear(),
        }
    }

    /// A failed pass is retried once immediately; persistent failure aborts
    /// the session.
    fn transcribe_with_retry(&mut self, hint: Option<&str>) -> Result<Hypothesis, SessionError> {
        let mut last_err = None;
        for attempt in 0..=RECOGNITION_RETRIES {
            match self.recognizer.transcribe(&self.window, hint) {
                Ok(hypothesis) => return Ok(hypothesis),
                Err(e) => {
                    if attempt < RECOGNITION_RETRIES {
                        eprintln!("⚠️  Recognition pass failed, retrying: {}", e);
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(SessionError::Recognition(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn ms_to_samples(&self, ms: u64) -> usize {
        (self.buffer.sample_rate() as u64 * ms / 1000) as usize
    }
}
