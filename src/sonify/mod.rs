// Sonification module
// Turns a window of filtered strain into 16-bit PCM audio and WAV files

pub mod audio;
pub mod wav;

pub use audio::{infer_sample_rate, signal_to_audio, to_audio, AudioBuffer, SonifyError, AMPLITUDE};
pub use wav::{audio_filename, generate_audio, write_wav};
