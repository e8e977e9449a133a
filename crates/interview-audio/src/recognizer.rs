//! Continuous speech recognition, gated by the speaking flag.
//!
//! The microphone is read on a dedicated OS thread for the whole session.
//! Each frame is checked against [`CoordinationState::is_speaking`] and
//! dropped while the agent is talking, so its own voice never reaches the
//! recognition backend. Backend events are consumed by a pump task that
//! collects finalized fragments for [`SpeechRecognizer::listen`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::{RecognitionBackend, RecognitionEvent, RecognitionStream, Transcript};
use crate::config::RecognizerConfig;
use crate::coordination::{CoordinationState, ListeningFlag};
use crate::device::InputDevice;
use crate::error::{AudioError, BackendError};

const TRANSCRIPT_CHANNEL_CAPACITY: usize = 64;
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_read: u64,
    pub frames_forwarded: u64,
    pub frames_suppressed: u64,
    /// Frames lost because the backend was down or not keeping up.
    pub frames_dropped: u64,
}

#[derive(Debug, Default)]
struct CaptureCounters {
    read: AtomicU64,
    forwarded: AtomicU64,
    suppressed: AtomicU64,
    dropped: AtomicU64,
}

/// State shared between the capture thread, the event pump and `listen`.
struct Shared {
    /// Sender into the current backend connection. `None` while disconnected.
    forward: StdMutex<Option<mpsc::Sender<Vec<u8>>>>,
    fragments: StdMutex<Vec<String>>,
    utterance_end: watch::Sender<bool>,
    stopped: AtomicBool,
    exit_capture: AtomicBool,
    counters: CaptureCounters,
}

impl Shared {
    fn set_forward(&self, sender: Option<mpsc::Sender<Vec<u8>>>) {
        if let Ok(mut slot) = self.forward.lock() {
            *slot = sender;
        }
    }

    fn is_connected(&self) -> bool {
        self.forward
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    fn forward_frame(&self, frame: Vec<u8>) -> bool {
        let Ok(slot) = self.forward.lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    fn push_fragment(&self, fragment: &str) {
        if let Ok(mut fragments) = self.fragments.lock() {
            fragments.push(fragment.to_string());
        }
    }

    fn clear_fragments(&self) {
        if let Ok(mut fragments) = self.fragments.lock() {
            fragments.clear();
        }
    }

    fn joined_text(&self) -> String {
        self.fragments
            .lock()
            .map(|fragments| fragments.join(" "))
            .unwrap_or_default()
    }
}

pub struct SpeechRecognizer {
    backend: Arc<dyn RecognitionBackend>,
    state: CoordinationState,
    listening: ListeningFlag,
    shared: Arc<Shared>,
    transcripts: broadcast::Sender<Transcript>,
    listen_turn: Mutex<()>,
    capture: Mutex<Option<thread::JoinHandle<Box<dyn InputDevice>>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    config: RecognizerConfig,
}

impl SpeechRecognizer {
    /// Opens the microphone, connects to the backend and starts capturing.
    ///
    /// A microphone that cannot be opened is fatal. A backend that cannot be
    /// reached is not: the recognizer starts degraded and `listen` retries
    /// the connection.
    pub async fn start(
        mut input: Box<dyn InputDevice>,
        state: CoordinationState,
        listening: ListeningFlag,
        backend: Arc<dyn RecognitionBackend>,
        config: RecognizerConfig,
    ) -> Result<Self, AudioError> {
        input.start()?;

        let (utterance_end, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            forward: StdMutex::new(None),
            fragments: StdMutex::new(Vec::new()),
            utterance_end,
            stopped: AtomicBool::new(false),
            exit_capture: AtomicBool::new(false),
            counters: CaptureCounters::default(),
        });
        let (transcripts, _) = broadcast::channel(TRANSCRIPT_CHANNEL_CAPACITY);

        let recognizer = Self {
            backend,
            state: state.clone(),
            listening,
            shared: shared.clone(),
            transcripts,
            listen_turn: Mutex::new(()),
            capture: Mutex::new(None),
            pump: Mutex::new(None),
            config,
        };

        if let Err(e) = recognizer.connect().await {
            tracing::error!("Failed to start recognition stream: {}", e);
        }

        let capture = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_loop(input, shared, state))
            .map_err(|e| AudioError::Device(format!("failed to spawn capture thread: {e}")))?;
        *recognizer.capture.lock().await = Some(capture);

        tracing::info!("Speech recognizer started");
        Ok(recognizer)
    }

    async fn connect(&self) -> Result<(), BackendError> {
        let (tx, rx) = mpsc::channel(self.config.forward_capacity.max(1));
        let events = self.backend.open(rx).await?;

        let mut pump = self.pump.lock().await;
        self.shared.set_forward(Some(tx));
        // `stop` may have run while the backend was connecting.
        if self.is_stopped() {
            self.shared.set_forward(None);
            return Err(BackendError::Closed);
        }
        if let Some(previous) = pump.take() {
            previous.abort();
        }
        *pump = Some(tokio::spawn(pump_events(
            events,
            self.shared.clone(),
            self.transcripts.clone(),
        )));
        tracing::info!("Recognition stream connected");
        Ok(())
    }

    /// Waits for the user to finish one utterance and returns its text.
    ///
    /// Concurrent callers are served one at a time. The wait covers both
    /// waiting for the agent to stop speaking and the utterance itself; when
    /// `timeout` elapses whatever was finalized so far is returned, which may
    /// be empty.
    pub async fn listen(&self, timeout: Option<Duration>) -> Result<String, AudioError> {
        if self.is_stopped() {
            return Err(AudioError::Closed);
        }
        let _turn = self.listen_turn.lock().await;
        if self.is_stopped() {
            return Err(AudioError::Closed);
        }
        let deadline = timeout.map(|t| Instant::now() + t);

        self.shared.clear_fragments();
        self.shared.utterance_end.send_replace(false);

        if !self.shared.is_connected() {
            tracing::warn!("Recognition stream is down; reconnecting...");
            if let Err(e) = self.connect().await {
                tracing::error!("Failed to reconnect recognition stream: {}", e);
                return Ok(String::new());
            }
        }

        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        if !self.state.await_silence(remaining).await {
            tracing::warn!("Agent still speaking when the listening window closed");
            return Ok(String::new());
        }

        let _listening = ListeningGuard::raise(&self.listening);
        tracing::info!("Listening...");

        let mut ended = self.shared.utterance_end.subscribe();
        if self.is_stopped() {
            return Ok(self.shared.joined_text());
        }
        let finished = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, ended.wait_for(|end| *end))
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false),
            None => ended.wait_for(|end| *end).await.is_ok(),
        };
        if !finished {
            tracing::info!("Listening window elapsed before the utterance ended");
        }

        let text = self.shared.joined_text();
        tracing::info!("Heard: {}", text);
        Ok(text)
    }

    /// Receiver of every transcript event, interim and final.
    pub fn subscribe(&self) -> broadcast::Receiver<Transcript> {
        self.transcripts.subscribe()
    }

    pub fn stats(&self) -> CaptureStats {
        let c = &self.shared.counters;
        CaptureStats {
            frames_read: c.read.load(Ordering::Relaxed),
            frames_forwarded: c.forwarded.load(Ordering::Relaxed),
            frames_suppressed: c.suppressed.load(Ordering::Relaxed),
            frames_dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Stops capture and closes the backend connection.
    ///
    /// A `listen` in progress returns the text it has so far. Calling this
    /// more than once is a no-op.
    pub async fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Stopping speech recognizer...");

        self.shared.utterance_end.send_replace(true);
        self.shared.exit_capture.store(true, Ordering::SeqCst);
        // Dropping the sender ends the backend's audio input.
        self.shared.set_forward(None);

        if let Some(capture) = self.capture.lock().await.take() {
            let joined = tokio::time::timeout(
                self.config.close_timeout,
                tokio::task::spawn_blocking(move || capture.join()),
            )
            .await;
            match joined {
                Ok(Ok(Ok(mut input))) => {
                    input.close();
                    tracing::info!("Microphone released");
                }
                Ok(Ok(Err(_))) => tracing::error!("Capture thread panicked"),
                Ok(Err(e)) => tracing::error!("Failed to join capture thread: {}", e),
                Err(_) => tracing::warn!("Capture thread did not stop in time"),
            }
        }

        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        tracing::info!("Speech recognizer stopped.");
    }
}

/// Raises the listening flag for as long as it is alive.
struct ListeningGuard<'a> {
    flag: &'a ListeningFlag,
}

impl<'a> ListeningGuard<'a> {
    fn raise(flag: &'a ListeningFlag) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for ListeningGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

fn capture_loop(
    mut input: Box<dyn InputDevice>,
    shared: Arc<Shared>,
    state: CoordinationState,
) -> Box<dyn InputDevice> {
    tracing::debug!("Capture thread started");
    let counters = &shared.counters;
    while !shared.exit_capture.load(Ordering::SeqCst) {
        let frame = match input.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("Error reading from microphone: {}", e);
                thread::sleep(READ_ERROR_BACKOFF);
                continue;
            }
        };
        counters.read.fetch_add(1, Ordering::Relaxed);

        if state.is_speaking() {
            counters.suppressed.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        if shared.forward_frame(frame) {
            counters.forwarded.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
    tracing::debug!("Capture thread exiting");
    input
}

async fn pump_events(
    mut events: RecognitionStream,
    shared: Arc<Shared>,
    transcripts: broadcast::Sender<Transcript>,
) {
    while let Some(event) = events.next().await {
        match event {
            RecognitionEvent::Transcript(transcript) => {
                let fragment = transcript.text.trim();
                if transcript.is_final && !fragment.is_empty() {
                    tracing::debug!("Final fragment: {}", fragment);
                    shared.push_fragment(fragment);
                }
                let _ = transcripts.send(transcript);
            }
            RecognitionEvent::UtteranceEnd => {
                tracing::debug!("Utterance ended");
                shared.utterance_end.send_replace(true);
            }
            RecognitionEvent::SpeechStarted => {
                tracing::debug!("Speech started");
            }
        }
    }

    tracing::warn!("Recognition stream closed");
    shared.set_forward(None);
    shared.utterance_end.send_replace(true);
}
