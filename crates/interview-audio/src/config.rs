//! Tunables for the audio core.
//!
//! Every timing constant the coordination logic depends on lives here so the
//! binary (or a test) can shorten or lengthen it without touching the code
//! that uses it.

use std::path::PathBuf;
use std::time::Duration;

// --- Defaults ---

/// Sample rate of synthesized speech and of everything written to the output device.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
/// Sample rate of microphone frames forwarded to the recognition backend.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Samples per microphone frame (20 ms at 16 kHz).
pub const INPUT_FRAME_SAMPLES: usize = 320;
/// Frames written per device write when playing a prerecorded clip.
pub const CLIP_CHUNK_FRAMES: usize = 1024;
/// How often `await_silence` re-reads the coordination flags.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Bounded wait used by every shutdown path before force-cancelling.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Bounded wait for a synthesis backend to accept an utterance.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bounded wait for the next chunk of a synthesized utterance.
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(10);
/// Queue bound for pending playback jobs.
pub const MAX_PENDING_JOBS: usize = 32;

/// What `enqueue` does when `max_pending_jobs` jobs are already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait until the worker makes room.
    #[default]
    Block,
    /// Fail with `AudioError::QueueFull`.
    Reject,
}

/// Parameters for opening a synthesis stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub model: String,
    pub sample_rate: u32,
    pub encoding: String,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            model: "aura-2-thalia-en".to_string(),
            sample_rate: OUTPUT_SAMPLE_RATE,
            encoding: "linear16".to_string(),
        }
    }
}

/// Parameters for opening a recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub model: String,
    pub language: String,
    pub sample_rate: u32,
    /// Silence (ms) after which the backend finalizes a transcript fragment.
    pub endpointing_ms: u32,
    /// Silence (ms) after which the backend reports the utterance as ended.
    pub utterance_end_ms: u32,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            model: "nova-2".to_string(),
            language: "en".to_string(),
            sample_rate: INPUT_SAMPLE_RATE,
            endpointing_ms: 300,
            utterance_end_ms: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub clip_chunk_frames: usize,
    /// Pause between clip chunks so other tasks get scheduled.
    pub clip_yield: Duration,
    pub max_pending_jobs: usize,
    pub overflow: OverflowPolicy,
    pub close_timeout: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: OUTPUT_SAMPLE_RATE,
            clip_chunk_frames: CLIP_CHUNK_FRAMES,
            clip_yield: Duration::from_millis(10),
            max_pending_jobs: MAX_PENDING_JOBS,
            overflow: OverflowPolicy::Block,
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Filler queued ahead of speech when `add_filler` is set.
    pub filler_duration: Duration,
    /// Silence played in place of speech the backend failed to produce.
    pub fallback_silence: Duration,
    /// How long `speak` waits for the backend to accept the text.
    pub connect_timeout: Duration,
    /// Longest gap between audio chunks before an utterance is cut short.
    pub chunk_timeout: Duration,
    pub close_timeout: Duration,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            filler_duration: Duration::from_millis(500),
            fallback_silence: Duration::from_millis(500),
            connect_timeout: CONNECT_TIMEOUT,
            chunk_timeout: CHUNK_TIMEOUT,
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub frame_samples: usize,
    /// Frames buffered between the capture thread and the backend before new ones are dropped.
    pub forward_capacity: usize,
    pub close_timeout: Duration,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            frame_samples: INPUT_FRAME_SAMPLES,
            forward_capacity: 256,
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

/// Configuration for a whole [`AudioSession`](crate::AudioSession).
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub poll_interval: Duration,
    pub notification_duration: Duration,
    /// Directory of prerecorded `.wav` fillers. `None` means fillers are synthetic silence.
    pub filler_dir: Option<PathBuf>,
    pub playback: PlaybackConfig,
    pub synthesizer: SynthesizerConfig,
    pub recognizer: RecognizerConfig,
    pub synthesis: SynthesisOptions,
    pub recognition: RecognitionOptions,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            notification_duration: Duration::from_millis(300),
            filler_dir: None,
            playback: PlaybackConfig::default(),
            synthesizer: SynthesizerConfig::default(),
            recognizer: RecognizerConfig::default(),
            synthesis: SynthesisOptions::default(),
            recognition: RecognitionOptions::default(),
        }
    }
}

impl AudioConfig {
    /// Applies one close timeout to every component.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.playback.close_timeout = timeout;
        self.synthesizer.close_timeout = timeout;
        self.recognizer.close_timeout = timeout;
        self
    }

    pub fn with_filler_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.filler_dir = Some(dir.into());
        self
    }
}
