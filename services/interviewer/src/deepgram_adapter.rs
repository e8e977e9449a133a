use async_trait::async_trait;
use deepgram_realtime::types::{ListenServerMessage, SpeakServerMessage};
use deepgram_realtime::{ListenOptions, SpeakEvent, SpeakOptions, listen, speak};
use futures::StreamExt;
use interview_audio::{
    BackendError, RecognitionBackend, RecognitionEvent, RecognitionOptions, RecognitionStream,
    SynthesisBackend, SynthesisEvent, SynthesisOptions, SynthesisStream, Transcript,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

fn client_config(api_key: &SecretString) -> deepgram_realtime::Config {
    deepgram_realtime::Config::builder()
        .with_api_key(api_key.expose_secret())
        .build()
}

/// Translates client failures into the audio core's retry-aware error kinds.
pub fn to_backend_error(err: deepgram_realtime::Error) -> BackendError {
    match err {
        deepgram_realtime::Error::Handshake(429) => BackendError::RateLimited,
        deepgram_realtime::Error::Handshake(status) => BackendError::Handshake(status),
        deepgram_realtime::Error::WebSocket(e) => BackendError::Connect(e.to_string()),
        deepgram_realtime::Error::Json(e) => BackendError::Protocol(e.to_string()),
        deepgram_realtime::Error::Server { code, message } => {
            BackendError::Protocol(format!("{code}: {message}"))
        }
        deepgram_realtime::Error::Closed => BackendError::Closed,
    }
}

/// An adapter that implements `SynthesisBackend` on top of Deepgram's speak socket.
/// Every utterance gets its own connection.
pub struct DeepgramSynthesis {
    config: deepgram_realtime::Config,
    options: SpeakOptions,
}

impl DeepgramSynthesis {
    pub fn new(api_key: &SecretString, options: &SynthesisOptions) -> Self {
        Self {
            config: client_config(api_key),
            options: SpeakOptions::new()
                .with_model(&options.model)
                .with_encoding(&options.encoding)
                .with_sample_rate(options.sample_rate),
        }
    }
}

#[async_trait]
impl SynthesisBackend for DeepgramSynthesis {
    async fn synthesize(&self, text: String) -> Result<SynthesisStream, BackendError> {
        let mut client = speak::connect(&self.config, &self.options)
            .await
            .map_err(to_backend_error)?;
        client.send_text(&text).await.map_err(to_backend_error)?;
        client.flush().await.map_err(to_backend_error)?;

        let stream = futures::stream::unfold(Some(client), |client| async move {
            let mut client = client?;
            loop {
                match client.next_event().await {
                    Ok(SpeakEvent::Audio(chunk)) => {
                        return Some((Ok(SynthesisEvent::Audio(chunk)), Some(client)));
                    }
                    Ok(SpeakEvent::Message(SpeakServerMessage::Flushed(_))) => {
                        if let Err(e) = client.close().await {
                            tracing::debug!("Failed to close speak socket cleanly: {}", e);
                        }
                        return Some((Ok(SynthesisEvent::Flushed), None));
                    }
                    Ok(SpeakEvent::Message(message)) => {
                        tracing::debug!("Speak message: {:?}", message);
                    }
                    Ok(SpeakEvent::Closed) => return Some((Ok(SynthesisEvent::Closed), None)),
                    Err(e) => return Some((Err(to_backend_error(e)), None)),
                }
            }
        });
        Ok(stream.boxed())
    }
}

/// An adapter that implements `RecognitionBackend` on top of Deepgram's listen socket.
pub struct DeepgramRecognition {
    config: deepgram_realtime::Config,
    options: ListenOptions,
}

impl DeepgramRecognition {
    pub fn new(api_key: &SecretString, options: &RecognitionOptions) -> Self {
        Self {
            config: client_config(api_key),
            options: ListenOptions::new()
                .with_model(&options.model)
                .with_language(&options.language)
                .with_sample_rate(options.sample_rate)
                .with_endpointing_ms(options.endpointing_ms)
                .with_utterance_end_ms(options.utterance_end_ms),
        }
    }
}

/// Maps a listen-socket message to the event the recognizer cares about, if any.
pub fn to_recognition_event(message: ListenServerMessage) -> Option<RecognitionEvent> {
    match message {
        ListenServerMessage::Results(results) => Some(RecognitionEvent::Transcript(Transcript {
            text: results.transcript().to_string(),
            is_final: results.is_final(),
        })),
        ListenServerMessage::UtteranceEnd(_) => Some(RecognitionEvent::UtteranceEnd),
        ListenServerMessage::SpeechStarted(_) => Some(RecognitionEvent::SpeechStarted),
        ListenServerMessage::Metadata(metadata) => {
            tracing::debug!("Listen session metadata, request {}", metadata.request_id());
            None
        }
        ListenServerMessage::Unknown => None,
    }
}

#[async_trait]
impl RecognitionBackend for DeepgramRecognition {
    async fn open(
        &self,
        audio: mpsc::Receiver<Vec<u8>>,
    ) -> Result<RecognitionStream, BackendError> {
        let connection = listen::connect(&self.config, &self.options, audio)
            .await
            .map_err(to_backend_error)?;

        let stream = futures::stream::unfold(connection, |mut connection| async move {
            loop {
                let message = connection.next_event().await?;
                if let Some(event) = to_recognition_event(message) {
                    return Some((event, connection));
                }
            }
        });
        Ok(stream.boxed())
    }
}
