use std::path::PathBuf;

/// Failures reported by a speech backend (synthesis or recognition).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("failed to connect to speech backend: {0}")]
    Connect(String),
    #[error("speech backend rejected the handshake with status {0}")]
    Handshake(u16),
    #[error("speech backend is rate limiting requests")]
    RateLimited,
    #[error("speech backend protocol error: {0}")]
    Protocol(String),
    #[error("speech backend connection closed")]
    Closed,
}

impl BackendError {
    /// Whether the same request may succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Connect(_) | BackendError::RateLimited | BackendError::Closed => true,
            BackendError::Handshake(status) => *status >= 500,
            BackendError::Protocol(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// The device could not be opened. Fatal at session construction.
    #[error("failed to open audio device: {0}")]
    DeviceOpen(String),
    #[error("audio device error: {0}")]
    Device(String),
    #[error("failed to load audio clip {path}: {source}")]
    Clip {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("playback queue is full ({0} jobs pending)")]
    QueueFull(usize),
    #[error("audio session is closed")]
    Closed,
}

impl AudioError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AudioError::Backend(e) => e.is_retryable(),
            AudioError::QueueFull(_) => true,
            _ => false,
        }
    }
}
