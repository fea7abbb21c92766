use anyhow::{Context, Result};
use std::path::PathBuf;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::RecognitionConfig;
use crate::transcript::{Hypothesis, HypothesisWord};

pub const RECOGNIZER_SAMPLE_RATE: u32 = 16000;

/// Minimum window Whisper will accept without garbage output (1 second).
const MIN_WINDOW_SAMPLES: usize = RECOGNIZER_SAMPLE_RATE as usize;

/// The external recognition capability.
///
/// Called repeatedly with overlapping/growing windows of the unconfirmed
/// audio. Implementations may be slow; the coordinator runs them on its own
/// thread and never blocks the device thread on this call.
pub trait Recognizer: Send {
    fn transcribe(&mut self, audio: &[f32], hint: Option<&str>) -> Result<Hypothesis>;
}

/// Whisper-backed recognizer.
pub struct WhisperRecognizer {
    ctx: WhisperContext,
    config: RecognitionConfig,
}

impl WhisperRecognizer {
    pub fn new(config: RecognitionConfig) -> Result<Self> {
        let model_path = Self::model_path(&config.model)?;

        println!("Loading Whisper model from: {}", model_path.display());

        let ctx_params = WhisperContextParameters {
            use_gpu: config.use_gpu,
            ..Default::default()
        };

        let ctx = WhisperContext::new_with_params(&model_path.to_string_lossy(), ctx_params)
            .context("Failed to load Whisper model")?;

        println!("Whisper model loaded (GPU: {})", config.use_gpu);

        Ok(WhisperRecognizer { ctx, config })
    }

    fn model_path(model_name: &str) -> Result<PathBuf> {
        let models_dir = dirs::home_dir()
            .context("Failed to get home directory")?
            .join(".hold-to-talk")
            .join("models");

        let model_filename = format!("ggml-{}.bin", model_name);
        let model_path = models_dir.join(&model_filename);

        if !model_path.exists() {
            anyhow::bail!(
                "Model file not found: {}\n\
                Please download the model from:\n\
                https://huggingface.co/ggerganov/whisper.cpp/tree/main\n\
                and place it in: {}",
                model_filename,
                models_dir.display()
            );
        }

        Ok(model_path)
    }
}

impl Recognizer for WhisperRecognizer {
    fn transcribe(&mut self, audio: &[f32], hint: Option<&str>) -> Result<Hypothesis> {
        // Whisper misbehaves on sub-second input; pad with silence.
        let padded;
        let audio = if audio.len() < MIN_WINDOW_SAMPLES {
            let mut p = Vec::with_capacity(MIN_WINDOW_SAMPLES);
            p.extend_from_slice(audio);
            p.resize(MIN_WINDOW_SAMPLES, 0.0);
            padded = p;
            &padded[..]
        } else {
            audio
        };

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if !self.config.language.is_empty() && self.config.language != "auto" {
            params.set_language(Some(&self.config.language));
        }

        // Prime the decoder with already-confirmed text so the next window
        // continues mid-sentence instead of restarting cold.
        if let Some(hint) = hint {
            if !hint.is_empty() {
                params.set_initial_prompt(hint);
            }
        }

        params.set_translate(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        // Suppress annotations like [BLANK_AUDIO], (coughs), etc.
        params.set_suppress_blank(true);
        params.set_suppress_non_speech_tokens(true);

        let mut state = self.ctx.create_state().context("Failed to create Whisper state")?;

        state
            .full(params, audio)
            .context("Failed to run Whisper transcription")?;

        let num_segments = state
            .full_n_segments()
            .context("Failed to get number of segments")?;

        let mut words = Vec::new();
        for i in 0..num_segments {
            let text = state
                .full_get_segment_text(i)
                .context("Failed to get segment text")?;
            // Timestamps are centiseconds from the start of the window.
            let t0 = state.full_get_segment_t0(i).unwrap_or(0).max(0) as usize;
            let t1 = state.full_get_segment_t1(i).unwrap_or(t0 as i64).max(t0 as i64) as usize;

            let start_sample = t0 * (RECOGNIZER_SAMPLE_RATE as usize / 100);
            let end_sample = t1 * (RECOGNIZER_SAMPLE_RATE as usize / 100);

            words.extend(segment_words(&text, start_sample, end_sample));
        }

        Ok(Hypothesis { words })
    }
}

/// Split a segment's text into words, spreading the segment's audio span
/// evenly across them. Whisper only times segments, not words; even
/// distribution keeps offsets monotonic, which is all the coordinator
/// relies on.
fn segment_words(text: &str, start_sample: usize, end_sample: usize) -> Vec<HypothesisWord> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let span = end_sample.saturating_sub(start_sample);
    let per_word = span / tokens.len();
    let last = tokens.len() - 1;

    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| HypothesisWord {
            text: (*token).to_string(),
            start_sample: start_sample + i * per_word,
            // Division truncates; pin the last word's end to the segment
            // end so the full span is accounted for.
            end_sample: if i == last {
                end_sample
            } else {
                start_sample + (i + 1) * per_word
            },
        })
        .collect()
}
