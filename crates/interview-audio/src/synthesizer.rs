//! Text to speech on top of the playback queue.
//!
//! `speak` reserves the utterance's place in the queue before the backend is
//! even contacted, so utterances always play in call order no matter how long
//! each one takes to start producing audio.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::backend::{SynthesisBackend, SynthesisEvent, SynthesisStream};
use crate::config::SynthesizerConfig;
use crate::error::{AudioError, BackendError};
use crate::job::{LiveStreamSender, PlaybackJob, silence};
use crate::playback::PlaybackEngine;

pub struct SpeechSynthesizer {
    backend: Arc<dyn SynthesisBackend>,
    playback: Arc<PlaybackEngine>,
    relays: Mutex<JoinSet<()>>,
    closed: AtomicBool,
    config: SynthesizerConfig,
    sample_rate: u32,
}

impl SpeechSynthesizer {
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        playback: Arc<PlaybackEngine>,
        config: SynthesizerConfig,
        sample_rate: u32,
    ) -> Self {
        Self {
            backend,
            playback,
            relays: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
            config,
            sample_rate,
        }
    }

    /// Queues `text` for speech and returns once the backend has accepted it.
    ///
    /// Playback itself happens in the background. Blank text is ignored. If
    /// the backend cannot be reached, a short stretch of silence takes the
    /// utterance's slot and the backend error is returned.
    pub async fn speak(&self, text: &str, add_filler: bool) -> Result<(), AudioError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AudioError::Closed);
        }
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring empty utterance");
            return Ok(());
        }

        if add_filler {
            self.playback
                .schedule_filler(self.config.filler_duration)
                .await?;
        }

        let (sender, job) = PlaybackJob::live();
        self.playback.enqueue(job).await?;

        tracing::info!("Speaking: {}", text);
        let connect_timeout = self.config.connect_timeout;
        let connected =
            match tokio::time::timeout(connect_timeout, self.backend.synthesize(text.to_string()))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::Connect(format!(
                    "no response within {connect_timeout:?}"
                ))),
            };

        match connected {
            Ok(stream) => {
                let fallback = silence(self.config.fallback_silence, self.sample_rate);
                let mut relays = self.relays.lock().await;
                // `close` may have taken the relay set while the backend was connecting.
                if self.closed.load(Ordering::SeqCst) {
                    sender.finish();
                    return Err(AudioError::Closed);
                }
                while relays.try_join_next().is_some() {}
                relays.spawn(relay(stream, sender, fallback, self.config.chunk_timeout));
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error in speak: {}", e);
                sender.send(silence(self.config.fallback_silence, self.sample_rate));
                sender.finish();
                Err(AudioError::Backend(e))
            }
        }
    }

    /// Waits for in-flight relays to finish, aborting any still running after
    /// `close_timeout`. Later calls to `speak` fail with [`AudioError::Closed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut relays = std::mem::take(&mut *self.relays.lock().await);
        if relays.is_empty() {
            return;
        }

        tracing::info!("Waiting for {} speech streams to finish...", relays.len());
        let finished = tokio::time::timeout(self.config.close_timeout, async {
            while relays.join_next().await.is_some() {}
        })
        .await;
        if finished.is_err() {
            tracing::warn!("Speech streams still running at shutdown; aborting them.");
            relays.abort_all();
        }
    }
}

/// Forwards backend audio into the utterance's live stream.
///
/// The stream is always terminated, and never left empty: if the backend
/// delivered nothing, `fallback` is played instead. A backend that goes quiet
/// for longer than `chunk_timeout` ends the utterance.
async fn relay(
    mut stream: SynthesisStream,
    sender: LiveStreamSender,
    fallback: Vec<u8>,
    chunk_timeout: Duration,
) {
    let mut delivered = 0usize;
    loop {
        let event = match tokio::time::timeout(chunk_timeout, stream.next()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                tracing::warn!("No audio for {:?}; ending utterance", chunk_timeout);
                break;
            }
        };
        match event {
            Ok(SynthesisEvent::Audio(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                if !sender.send(chunk) {
                    tracing::debug!("Playback dropped the stream; stopping relay");
                    break;
                }
                delivered += 1;
            }
            Ok(SynthesisEvent::Flushed) => {
                tracing::debug!("Synthesis flushed after {} chunks", delivered);
                break;
            }
            Ok(SynthesisEvent::Closed) => {
                tracing::debug!("Synthesis connection closed");
                break;
            }
            Err(e) => {
                tracing::error!("Error receiving audio stream: {}", e);
                break;
            }
        }
    }

    if delivered == 0 {
        tracing::warn!("No audio received for utterance; playing silence instead");
        sender.send(fallback);
    }
    sender.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockSynthesisBackend;
    use crate::config::PlaybackConfig;
    use crate::coordination::CoordinationState;
    use crate::filler::FillerLibrary;
    use crate::testing::{FakeSynthesis, HangingSynthesis, OutputLog, RecordingOutput};

    const RATE: u32 = 24_000;

    fn test_synthesizer_config() -> SynthesizerConfig {
        SynthesizerConfig {
            connect_timeout: Duration::from_millis(200),
            chunk_timeout: Duration::from_secs(1),
            close_timeout: Duration::from_millis(500),
            ..SynthesizerConfig::default()
        }
    }

    fn setup(
        backend: Arc<dyn SynthesisBackend>,
    ) -> (SpeechSynthesizer, Arc<PlaybackEngine>, OutputLog, CoordinationState) {
        setup_with(backend, test_synthesizer_config())
    }

    fn setup_with(
        backend: Arc<dyn SynthesisBackend>,
        config: SynthesizerConfig,
    ) -> (SpeechSynthesizer, Arc<PlaybackEngine>, OutputLog, CoordinationState) {
        let (output, log) = RecordingOutput::new();
        let (state, speaking, _) = CoordinationState::new(Duration::from_millis(5));
        let playback_config = PlaybackConfig {
            clip_yield: Duration::from_millis(1),
            ..PlaybackConfig::default()
        };
        let playback = Arc::new(
            PlaybackEngine::start(
                Box::new(output),
                speaking,
                FillerLibrary::default(),
                playback_config,
            )
            .unwrap(),
        );
        let synthesizer = SpeechSynthesizer::new(backend, playback.clone(), config, RATE);
        (synthesizer, playback, log, state)
    }

    fn fallback_bytes() -> usize {
        silence(SynthesizerConfig::default().fallback_silence, RATE).len()
    }

    #[tokio::test]
    async fn utterances_play_in_call_order_despite_latency() {
        let backend = FakeSynthesis::new(2)
            .with_latency("first", Duration::from_millis(300))
            .with_latency("second", Duration::from_millis(50))
            .with_latency("third", Duration::from_millis(150));
        let (synthesizer, playback, log, _) = setup(Arc::new(backend));

        synthesizer.speak("first", false).await.unwrap();
        synthesizer.speak("second", false).await.unwrap();
        synthesizer.speak("third", false).await.unwrap();
        playback.wait_for_drain().await;

        assert_eq!(
            log.labels(),
            vec!["first:0", "first:1", "second:0", "second:1", "third:0", "third:1"]
        );
    }

    #[tokio::test]
    async fn blank_text_is_a_no_op() {
        let (synthesizer, playback, log, _) = setup(Arc::new(FakeSynthesis::new(1)));

        synthesizer.speak("", true).await.unwrap();
        synthesizer.speak("   \n", false).await.unwrap();
        playback.wait_for_drain().await;

        assert_eq!(playback.stats().enqueued, 0);
        assert_eq!(log.write_count(), 0);
    }

    #[tokio::test]
    async fn filler_plays_before_the_utterance() {
        let (synthesizer, playback, log, _) = setup(Arc::new(FakeSynthesis::new(1)));

        synthesizer.speak("  hello  ", true).await.unwrap();
        playback.wait_for_drain().await;

        let writes = log.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].iter().all(|b| *b == 0));
        assert_eq!(writes[0].len(), silence(Duration::from_millis(500), RATE).len());
        assert_eq!(writes[1], b"hello:0".to_vec());
    }

    #[tokio::test]
    async fn connect_failure_is_reported_and_silence_fills_the_slot() {
        let mut backend = MockSynthesisBackend::new();
        backend
            .expect_synthesize()
            .times(1)
            .returning(|_| Err(BackendError::Connect("connection refused".to_string())));
        let (synthesizer, playback, log, _) = setup(Arc::new(backend));

        let err = synthesizer
            .speak("are you there", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AudioError::Backend(BackendError::Connect(_))));
        assert!(err.is_retryable());

        playback.wait_for_drain().await;
        let bytes = log.bytes();
        assert_eq!(bytes.len(), fallback_bytes());
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[tokio::test]
    async fn stream_error_ends_the_utterance_without_stalling_the_queue() {
        let mut backend = MockSynthesisBackend::new();
        backend.expect_synthesize().returning(|text| {
            let events = if text == "broken" {
                vec![
                    Ok(SynthesisEvent::Audio(b"partial".to_vec())),
                    Err(BackendError::Protocol("bad frame".to_string())),
                    Ok(SynthesisEvent::Audio(b"lost".to_vec())),
                ]
            } else {
                vec![
                    Ok(SynthesisEvent::Audio(b"fine".to_vec())),
                    Ok(SynthesisEvent::Flushed),
                ]
            };
            Ok(futures::stream::iter(events).boxed())
        });
        let (synthesizer, playback, log, _) = setup(Arc::new(backend));

        synthesizer.speak("broken", false).await.unwrap();
        synthesizer.speak("next", false).await.unwrap();
        playback.wait_for_drain().await;

        assert_eq!(log.labels(), vec!["partial", "fine"]);
    }

    #[tokio::test]
    async fn silent_backend_response_is_replaced_by_fallback() {
        let mut backend = MockSynthesisBackend::new();
        backend.expect_synthesize().returning(|_| {
            Ok(futures::stream::iter(vec![Ok(SynthesisEvent::Flushed)]).boxed())
        });
        let (synthesizer, playback, log, _) = setup(Arc::new(backend));

        synthesizer.speak("hello", false).await.unwrap();
        playback.wait_for_drain().await;

        assert_eq!(log.bytes().len(), fallback_bytes());
    }

    #[tokio::test]
    async fn close_lets_running_relays_finish() {
        let backend = FakeSynthesis::new(3).with_latency("slow", Duration::from_millis(100));
        let (synthesizer, playback, log, _) = setup(Arc::new(backend));

        synthesizer.speak("slow", false).await.unwrap();
        synthesizer.close().await;
        playback.wait_for_drain().await;

        assert_eq!(log.labels(), vec!["slow:0", "slow:1", "slow:2"]);
    }

    #[tokio::test]
    async fn speak_after_close_fails() {
        let (synthesizer, _playback, _log, _) = setup(Arc::new(FakeSynthesis::new(1)));

        synthesizer.close().await;
        synthesizer.close().await;

        let result = synthesizer.speak("too late", false).await;
        assert!(matches!(result, Err(AudioError::Closed)));
    }

    #[tokio::test]
    async fn hanging_connect_times_out_and_frees_the_queue() {
        // --- Arrange ---
        let (synthesizer, playback, log, state) = setup(Arc::new(HangingSynthesis));

        // --- Act ---
        let result = tokio::time::timeout(Duration::from_secs(3), synthesizer.speak("hello", false))
            .await
            .expect("speak must not hang on a stalled backend");

        // --- Assert ---
        let err = result.unwrap_err();
        assert!(matches!(err, AudioError::Backend(BackendError::Connect(_))));
        assert!(err.is_retryable());
        tokio::time::timeout(Duration::from_secs(3), playback.wait_for_drain())
            .await
            .expect("the reserved slot must drain");
        assert!(!state.is_speaking());
        assert_eq!(log.bytes().len(), fallback_bytes());
    }

    #[tokio::test]
    async fn stalled_stream_is_cut_off_after_the_chunk_timeout() {
        let mut backend = MockSynthesisBackend::new();
        backend.expect_synthesize().returning(|_| {
            let partial = vec![Ok(SynthesisEvent::Audio(b"partial".to_vec()))];
            Ok(futures::stream::iter(partial)
                .chain(futures::stream::pending())
                .boxed())
        });
        let config = SynthesizerConfig {
            chunk_timeout: Duration::from_millis(100),
            ..test_synthesizer_config()
        };
        let (synthesizer, playback, log, state) = setup_with(Arc::new(backend), config);

        synthesizer.speak("stuck", false).await.unwrap();
        tokio::time::timeout(Duration::from_secs(3), playback.wait_for_drain())
            .await
            .expect("a stalled stream must still end");

        assert_eq!(log.labels(), vec!["partial"]);
        assert!(!state.is_speaking());
    }

    #[tokio::test]
    async fn close_during_connect_spawns_no_relay() {
        let backend = FakeSynthesis::new(1).with_connect_delay(Duration::from_millis(150));
        let (synthesizer, playback, log, state) = setup(Arc::new(backend));
        let synthesizer = Arc::new(synthesizer);

        let speaking = tokio::spawn({
            let synthesizer = synthesizer.clone();
            async move { synthesizer.speak("too late", false).await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        synthesizer.close().await;

        let result = speaking.await.unwrap();
        assert!(matches!(result, Err(AudioError::Closed)));
        assert!(synthesizer.relays.lock().await.is_empty());
        tokio::time::timeout(Duration::from_secs(3), playback.wait_for_drain())
            .await
            .expect("the reserved slot must drain");
        assert!(log.labels().iter().all(|l| !l.starts_with("too late")));
        assert!(!state.is_speaking());
    }
}
