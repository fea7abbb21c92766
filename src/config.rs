use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HotkeyConfig {
    /// Held while speaking; press starts a session, release finishes it.
    #[serde(default = "default_talk_hotkey")]
    pub talk: String,
}

fn default_talk_hotkey() -> String {
    "Ctrl+Shift+Space".to_string()
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        HotkeyConfig {
            talk: default_talk_hotkey(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    /// Input device name; empty means the system default.
    #[serde(default)]
    pub device: String,
    /// Hard ceiling on session length. Hitting it ends the session with an
    /// error rather than truncating audio silently.
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,
    /// How long to keep draining device frames after hotkey release, so the
    /// tail of speech spoken right at release is not lost.
    #[serde(default = "default_flush_grace_ms")]
    pub flush_grace_ms: u64,
    /// RMS threshold below which a window counts as silence.
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
}

fn default_max_session_secs() -> u64 {
    120
}

fn default_flush_grace_ms() -> u64 {
    150
}

fn default_silence_threshold() -> f32 {
    0.003 // RMS threshold, sensitive enough for quiet speech
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            device: String::new(),
            max_session_secs: default_max_session_secs(),
            flush_grace_ms: default_flush_grace_ms(),
            silence_threshold: default_silence_threshold(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamingConfig {
    /// Emit partial results while still recording. When off, recognition
    /// runs once over the whole session at release.
    #[serde(default = "default_streaming_enabled")]
    pub enabled: bool,
    /// Minimum new audio before the next recognition pass. Tuned
    /// empirically, not a contract.
    #[serde(default = "default_min_new_audio_ms")]
    pub min_new_audio_ms: u64,
    /// Trailing words of an agreed prefix held back from confirmation.
    /// Tuned empirically, not a contract.
    #[serde(default = "default_agreement_margin_words")]
    pub agreement_margin_words: usize,
    /// Emit transcript updates as JSON lines on stdout instead of the
    /// human-readable output, for piping into another process.
    #[serde(default)]
    pub wire_updates: bool,
}

fn default_streaming_enabled() -> bool {
    true
}

fn default_min_new_audio_ms() -> u64 {
    700
}

fn default_agreement_margin_words() -> usize {
    2
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            enabled: default_streaming_enabled(),
            min_new_audio_ms: default_min_new_audio_ms(),
            agreement_margin_words: default_agreement_margin_words(),
            wire_updates: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognitionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_use_gpu")]
    pub use_gpu: bool,
}

fn default_model() -> String {
    "small.en".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_use_gpu() -> bool {
    true
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        RecognitionConfig {
            model: default_model(),
            language: default_language(),
            use_gpu: default_use_gpu(),
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".hold-to-talk"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.yaml"))
    }

    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config =
                serde_yaml::from_str(&contents).context("Failed to parse config file")?;

            config.validate()?;

            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            println!("Created default config at: {}", config_path.display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.audio.max_session_secs == 0 {
            bail!("max_session_secs must be greater than 0");
        }
        if self.audio.max_session_secs > 3600 {
            bail!("max_session_secs must be <= 3600 (1 hour)");
        }

        if self.audio.flush_grace_ms > 2000 {
            bail!("flush_grace_ms must be <= 2000 (2 seconds)");
        }

        if self.audio.silence_threshold < 0.0 {
            bail!("silence_threshold must be >= 0.0");
        }
        if self.audio.silence_threshold > 1.0 {
            bail!("silence_threshold must be <= 1.0");
        }

        if self.streaming.min_new_audio_ms == 0 {
            bail!("min_new_audio_ms must be greater than 0");
        }
        if self.streaming.min_new_audio_ms > 5000 {
            bail!("min_new_audio_ms must be <= 5000 (5 seconds)");
        }

        if self.streaming.agreement_margin_words > 10 {
            bail!("agreement_margin_words must be <= 10");
        }

        if self.recognition.model.is_empty() {
            bail!("model name cannot be empty");
        }
        if self.recognition.language.is_empty() {
            bail!("language code cannot be empty");
        }

        if self.hotkey.talk.is_empty() {
            bail!("talk hotkey cannot be empty");
        }

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        let config_path = Self::config_path()?;
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs::write(&config_path, yaml).context("Failed to write config file")?;

        Ok(())
    }
}
