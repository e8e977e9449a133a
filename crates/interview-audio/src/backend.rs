//! Provider-agnostic contracts for the external speech backend.
//!
//! Concrete providers live outside this crate and are adapted to these
//! traits, in the same way the service crate adapts its realtime clients.

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::error::BackendError;

/// Events produced while one utterance is being synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    /// A chunk of PCM16 audio at the configured output sample rate.
    Audio(Vec<u8>),
    /// The backend has emitted all audio for the text sent.
    Flushed,
    /// The backend closed the connection.
    Closed,
}

pub type SynthesisStream = BoxStream<'static, Result<SynthesisEvent, BackendError>>;

/// Text-to-speech provider. One call per utterance.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Connects, sends `text` followed by a flush, and returns the audio as it
    /// arrives. Returning `Err` means the connection could not be established.
    async fn synthesize(&self, text: String) -> Result<SynthesisStream, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Transcript(Transcript),
    /// The backend detected the end of the user's utterance.
    UtteranceEnd,
    SpeechStarted,
}

/// Ends when the backend connection closes.
pub type RecognitionStream = BoxStream<'static, RecognitionEvent>;

/// Streaming speech-to-text provider.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Opens a recognition connection that consumes `audio` (PCM16 frames at
    /// the recognition sample rate) until the sender side is dropped.
    async fn open(&self, audio: mpsc::Receiver<Vec<u8>>)
    -> Result<RecognitionStream, BackendError>;
}
