//! In-memory devices and backends for exercising the audio core without
//! hardware or network access.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::backend::{
    RecognitionBackend, RecognitionEvent, RecognitionStream, SynthesisBackend, SynthesisEvent,
    SynthesisStream, Transcript,
};
use crate::device::{InputDevice, OutputDevice};
use crate::error::{AudioError, BackendError};

pub fn write_test_wav(path: &Path, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

/// What a [`RecordingOutput`] was asked to play.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    drains: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl OutputLog {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.writes.lock().unwrap().concat()
    }

    /// Writes as UTF-8, for tests that tag chunks with readable labels.
    pub fn labels(&self) -> Vec<String> {
        self.writes()
            .into_iter()
            .map(|w| String::from_utf8_lossy(&w).into_owned())
            .collect()
    }

    pub fn drains(&self) -> usize {
        self.drains.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct RecordingOutput {
    log: OutputLog,
    fail_on: Option<Vec<u8>>,
    fail_start: bool,
    drain_delay: Duration,
}

impl RecordingOutput {
    pub fn new() -> (Self, OutputLog) {
        let log = OutputLog::default();
        let output = Self {
            log: log.clone(),
            fail_on: None,
            fail_start: false,
            drain_delay: Duration::ZERO,
        };
        (output, log)
    }

    pub fn failing_to_start() -> Self {
        let (mut output, _) = Self::new();
        output.fail_start = true;
        output
    }

    /// Fails any write whose payload equals `chunk`.
    pub fn failing_on(mut self, chunk: Vec<u8>) -> Self {
        self.fail_on = Some(chunk);
        self
    }

    /// Makes `drain` take `delay`, like a device with audio still buffered.
    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay = delay;
        self
    }
}

#[async_trait]
impl OutputDevice for RecordingOutput {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.fail_start {
            return Err(AudioError::DeviceOpen("no output device".to_string()));
        }
        Ok(())
    }

    async fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        if self.fail_on.as_deref() == Some(pcm) {
            return Err(AudioError::Device("write rejected".to_string()));
        }
        self.log.writes.lock().unwrap().push(pcm.to_vec());
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), AudioError> {
        tokio::time::sleep(self.drain_delay).await;
        self.log.drains.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.log.closed.store(true, Ordering::SeqCst);
    }
}

/// Microphone fed from the test through a channel.
pub struct ScriptedInput {
    frames: std::sync::mpsc::Receiver<Vec<u8>>,
    fail_start: bool,
    closed: Arc<AtomicBool>,
}

pub fn scripted_input() -> (std::sync::mpsc::Sender<Vec<u8>>, ScriptedInput) {
    let (tx, frames) = std::sync::mpsc::channel();
    let input = ScriptedInput {
        frames,
        fail_start: false,
        closed: Arc::new(AtomicBool::new(false)),
    };
    (tx, input)
}

impl ScriptedInput {
    pub fn failing_to_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl InputDevice for ScriptedInput {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.fail_start {
            return Err(AudioError::DeviceOpen("no input device".to_string()));
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, AudioError> {
        use std::sync::mpsc::RecvTimeoutError;
        match self.frames.recv_timeout(Duration::from_millis(10)) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Synthesis backend that "speaks" each text as chunks labelled `"{text}:{n}"`.
#[derive(Debug, Clone, Default)]
pub struct FakeSynthesis {
    latencies: HashMap<String, Duration>,
    connect_delay: Duration,
    chunks: usize,
}

impl FakeSynthesis {
    pub fn new(chunks: usize) -> Self {
        Self {
            latencies: HashMap::new(),
            connect_delay: Duration::ZERO,
            chunks,
        }
    }

    /// Delays every `synthesize` call by `delay` before the stream is returned.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Delays the first chunk of `text` by `latency`.
    pub fn with_latency(mut self, text: &str, latency: Duration) -> Self {
        self.latencies.insert(text.to_string(), latency);
        self
    }
}

#[async_trait]
impl SynthesisBackend for FakeSynthesis {
    async fn synthesize(&self, text: String) -> Result<SynthesisStream, BackendError> {
        tokio::time::sleep(self.connect_delay).await;
        let latency = self.latencies.get(&text).copied().unwrap_or_default();
        let events: Vec<Result<SynthesisEvent, BackendError>> = (0..self.chunks)
            .map(|i| Ok(SynthesisEvent::Audio(format!("{text}:{i}").into_bytes())))
            .chain(std::iter::once(Ok(SynthesisEvent::Flushed)))
            .collect();

        let audio = futures::stream::iter(events).then(|event| async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            event
        });
        let delayed = futures::stream::once(async move {
            tokio::time::sleep(latency).await;
            audio
        })
        .flatten();
        Ok(delayed.boxed())
    }
}

/// Synthesis backend that accepts the request and never answers.
pub struct HangingSynthesis;

#[async_trait]
impl SynthesisBackend for HangingSynthesis {
    async fn synthesize(&self, _text: String) -> Result<SynthesisStream, BackendError> {
        std::future::pending().await
    }
}

/// Recognition backend whose events are pushed by the test.
#[derive(Clone)]
pub struct FakeRecognition {
    received: Arc<AtomicUsize>,
    events: Arc<Mutex<Option<mpsc::UnboundedReceiver<RecognitionEvent>>>>,
}

pub fn fake_recognition() -> (FakeRecognition, RecognitionScript) {
    let (tx, rx) = mpsc::unbounded_channel();
    let backend = FakeRecognition {
        received: Arc::new(AtomicUsize::new(0)),
        events: Arc::new(Mutex::new(Some(rx))),
    };
    let script = RecognitionScript {
        tx,
        received: backend.received.clone(),
    };
    (backend, script)
}

/// Test-side handle of a [`FakeRecognition`].
pub struct RecognitionScript {
    tx: mpsc::UnboundedSender<RecognitionEvent>,
    received: Arc<AtomicUsize>,
}

impl RecognitionScript {
    pub fn interim(&self, text: &str) {
        self.push(RecognitionEvent::Transcript(Transcript {
            text: text.to_string(),
            is_final: false,
        }));
    }

    pub fn final_fragment(&self, text: &str) {
        self.push(RecognitionEvent::Transcript(Transcript {
            text: text.to_string(),
            is_final: true,
        }));
    }

    pub fn utterance_end(&self) {
        self.push(RecognitionEvent::UtteranceEnd);
    }

    pub fn push(&self, event: RecognitionEvent) {
        let _ = self.tx.send(event);
    }

    /// Frames the backend has received from the capture loop.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub async fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.received() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

#[async_trait]
impl RecognitionBackend for FakeRecognition {
    async fn open(
        &self,
        mut audio: mpsc::Receiver<Vec<u8>>,
    ) -> Result<RecognitionStream, BackendError> {
        let events = self
            .events
            .lock()
            .unwrap()
            .take()
            .ok_or(BackendError::Connect("fake recognition already opened".to_string()))?;

        let received = self.received.clone();
        tokio::spawn(async move {
            while audio.recv().await.is_some() {
                received.fetch_add(1, Ordering::SeqCst);
            }
        });

        let stream = futures::stream::unfold(events, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        });
        Ok(stream.boxed())
    }
}
