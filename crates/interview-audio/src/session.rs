//! The surface the interview agent talks to.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::backend::{RecognitionBackend, SynthesisBackend, Transcript};
use crate::config::AudioConfig;
use crate::coordination::CoordinationState;
use crate::device::{InputDevice, OutputDevice};
use crate::error::AudioError;
use crate::filler::FillerLibrary;
use crate::playback::{PlaybackEngine, PlaybackStats};
use crate::recognizer::{CaptureStats, SpeechRecognizer};
use crate::synthesizer::SpeechSynthesizer;

/// One half-duplex voice session: a single speaker and a single microphone.
pub struct AudioSession {
    state: CoordinationState,
    playback: Arc<PlaybackEngine>,
    synthesizer: SpeechSynthesizer,
    recognizer: SpeechRecognizer,
    config: AudioConfig,
}

impl AudioSession {
    /// Opens both devices and starts playback and recognition.
    ///
    /// Fails if either device cannot be opened. A recognition backend that
    /// cannot be reached only degrades `listen` to empty results.
    pub async fn start(
        config: AudioConfig,
        output: Box<dyn OutputDevice>,
        input: Box<dyn InputDevice>,
        synthesis: Arc<dyn SynthesisBackend>,
        recognition: Arc<dyn RecognitionBackend>,
    ) -> Result<Self, AudioError> {
        tracing::info!("Starting audio session...");
        let (state, speaking, listening) = CoordinationState::new(config.poll_interval);

        let fillers = match &config.filler_dir {
            Some(dir) => FillerLibrary::scan(dir),
            None => FillerLibrary::default(),
        };

        let playback = Arc::new(PlaybackEngine::start(
            output,
            speaking,
            fillers,
            config.playback.clone(),
        )?);

        let recognizer = match SpeechRecognizer::start(
            input,
            state.clone(),
            listening,
            recognition,
            config.recognizer.clone(),
        )
        .await
        {
            Ok(recognizer) => recognizer,
            Err(e) => {
                playback.close().await;
                return Err(e);
            }
        };

        let synthesizer = SpeechSynthesizer::new(
            synthesis,
            playback.clone(),
            config.synthesizer.clone(),
            config.playback.sample_rate,
        );

        tracing::info!("Audio session ready");
        Ok(Self {
            state,
            playback,
            synthesizer,
            recognizer,
            config,
        })
    }

    /// Queues `text` to be spoken, optionally preceded by a short filler.
    pub async fn speak(&self, text: &str, add_filler: bool) -> Result<(), AudioError> {
        self.synthesizer.speak(text, add_filler).await
    }

    /// Returns once everything queued so far has been played.
    pub async fn wait_for_drain(&self) {
        self.playback.wait_for_drain().await
    }

    /// Listens for one utterance. See [`SpeechRecognizer::listen`].
    pub async fn listen(&self, timeout: Option<Duration>) -> Result<String, AudioError> {
        self.recognizer.listen(timeout).await
    }

    /// Plays a short attention cue.
    pub async fn notify(&self) -> Result<(), AudioError> {
        self.playback
            .schedule_filler(self.config.notification_duration)
            .await
    }

    pub fn state(&self) -> CoordinationState {
        self.state.clone()
    }

    pub fn subscribe_transcripts(&self) -> broadcast::Receiver<Transcript> {
        self.recognizer.subscribe()
    }

    pub fn playback_stats(&self) -> PlaybackStats {
        self.playback.stats()
    }

    pub fn capture_stats(&self) -> CaptureStats {
        self.recognizer.stats()
    }

    /// Shuts everything down. Safe to call more than once.
    ///
    /// Pending speech gets a chance to finish first: relays are awaited, then
    /// the playback queue, then recognition is stopped.
    pub async fn close(&self) {
        tracing::info!("Closing audio session...");
        self.synthesizer.close().await;
        self.playback.close().await;
        self.recognizer.stop().await;
        tracing::info!("Audio session closed.");
    }
}
