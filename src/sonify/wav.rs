// WAV export
// Writes quantised audio as mono 16-bit PCM

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs;
use std::path::Path;

use crate::sonify::audio::{to_audio, AudioBuffer, SonifyError};
use crate::strain::TimeSeries;

/// File name for an event's audio (e.g., "gravitational_wave_GW150914.wav")
pub fn audio_filename(event_name: &str) -> String {
    format!("gravitational_wave_{}.wav", event_name)
}

/// Write `audio` to `path`, creating parent directories as needed
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<(), SonifyError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Sonify `series` around `event_time` and write the result to `path`.
/// Nothing is written if the conversion fails.
pub fn generate_audio(
    series: &TimeSeries,
    event_time: f64,
    time_window: f64,
    path: &Path,
) -> Result<AudioBuffer, SonifyError> {
    let audio = to_audio(series, event_time, time_window)?;
    write_wav(path, &audio)?;

    log::info!(
        "Audio file written: {} ({} Hz, {:.2} s)",
        path.display(),
        audio.sample_rate,
        audio.duration_secs()
    );

    Ok(audio)
}
