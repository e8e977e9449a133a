//! Half-duplex audio coordination for a voice interview agent.
//!
//! Everything the agent says goes through one [`PlaybackEngine`] queue, and
//! the microphone feeding speech recognition is gated off while that queue is
//! playing. [`AudioSession`] ties the pieces together.

pub mod backend;
pub mod config;
pub mod coordination;
pub mod device;
pub mod error;
pub mod filler;
pub mod job;
pub mod playback;
pub mod recognizer;
pub mod session;
pub mod synthesizer;

#[cfg(test)]
mod testing;

pub use backend::{
    RecognitionBackend, RecognitionEvent, RecognitionStream, SynthesisBackend, SynthesisEvent,
    SynthesisStream, Transcript,
};
pub use config::{
    AudioConfig, OverflowPolicy, PlaybackConfig, RecognitionOptions, RecognizerConfig,
    SynthesisOptions, SynthesizerConfig,
};
pub use coordination::{CoordinationState, ListeningFlag, SpeakingFlag};
pub use device::{InputDevice, OutputDevice};
pub use error::{AudioError, BackendError};
pub use filler::FillerLibrary;
pub use job::{LiveStreamSender, PlaybackJob};
pub use playback::{PlaybackEngine, PlaybackStats};
pub use recognizer::{CaptureStats, SpeechRecognizer};
pub use session::AudioSession;
pub use synthesizer::SpeechSynthesizer;
