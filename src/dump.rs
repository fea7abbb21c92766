/// Debug audio dumps.
///
/// Writes a session's captured frames to a WAV file for offline analysis
/// of the streaming pipeline. Write-only: nothing in the core reads these
/// back.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::capture_buffer::CaptureBuffer;
use crate::config::Config;

pub fn dump_dir() -> Result<PathBuf> {
    Ok(Config::config_dir()?.join("recordings"))
}

/// Write every frame in the buffer (from sequence 0) to `path` as 32-bit
/// float mono WAV at the buffer's sample rate.
pub fn write_wav(buffer: &CaptureBuffer, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    let (frames, _) = buffer.drain_from(0);
    for frame in &frames {
        for &sample in &frame.samples {
            writer.write_sample(sample).context("Failed to write sample")?;
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    println!(
        "💾 Wrote {} frames ({:.2}s) to {}",
        frames.len(),
        buffer.total_duration().as_secs_f32(),
        path.display()
    );
    Ok(())
}
