//! Shared speaking/listening signal.
//!
//! Any component may read the flags through a [`CoordinationState`], but each
//! flag has exactly one writer: the playback worker owns the [`SpeakingFlag`]
//! and the recognizer owns the [`ListeningFlag`]. Neither writer handle is
//! `Clone`, so the single-writer rule holds by construction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
struct Flags {
    speaking: AtomicBool,
    listening: AtomicBool,
}

/// Read handle over the two coordination flags.
#[derive(Debug, Clone)]
pub struct CoordinationState {
    flags: Arc<Flags>,
    poll_interval: Duration,
}

/// Sole writer of the `speaking` flag.
#[derive(Debug)]
pub struct SpeakingFlag {
    flags: Arc<Flags>,
}

/// Sole writer of the `listening` flag.
#[derive(Debug)]
pub struct ListeningFlag {
    flags: Arc<Flags>,
}

impl CoordinationState {
    /// Creates the state for one session along with its two writer handles.
    pub fn new(poll_interval: Duration) -> (Self, SpeakingFlag, ListeningFlag) {
        let flags = Arc::new(Flags::default());
        let state = Self {
            flags: flags.clone(),
            poll_interval,
        };
        let speaking = SpeakingFlag {
            flags: flags.clone(),
        };
        let listening = ListeningFlag { flags };
        (state, speaking, listening)
    }

    pub fn is_speaking(&self) -> bool {
        self.flags.speaking.load(Ordering::SeqCst)
    }

    pub fn is_listening(&self) -> bool {
        self.flags.listening.load(Ordering::SeqCst)
    }

    pub fn is_silent(&self) -> bool {
        !self.is_speaking() && !self.is_listening()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Polls until both flags read false.
    ///
    /// Returns `false` if `timeout` elapses first. `None` waits indefinitely.
    pub async fn await_silence(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.is_silent() {
                return true;
            }
            let mut pause = self.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                pause = pause.min(deadline - now);
            }
            tokio::time::sleep(pause).await;
        }
    }
}

impl SpeakingFlag {
    pub fn set(&self, speaking: bool) {
        let was = self.flags.speaking.swap(speaking, Ordering::SeqCst);
        if was != speaking {
            tracing::debug!("speaking={}", speaking);
        }
    }
}

impl ListeningFlag {
    pub fn set(&self, listening: bool) {
        let was = self.flags.listening.swap(listening, Ordering::SeqCst);
        if was != listening {
            tracing::debug!("listening={}", listening);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_start_cleared() {
        let (state, _, _) = CoordinationState::new(Duration::from_millis(10));
        assert!(!state.is_speaking());
        assert!(!state.is_listening());
        assert!(state.is_silent());
    }

    #[test]
    fn each_writer_only_touches_its_own_flag() {
        let (state, speaking, listening) = CoordinationState::new(Duration::from_millis(10));

        speaking.set(true);
        assert!(state.is_speaking());
        assert!(!state.is_listening());

        listening.set(true);
        speaking.set(false);
        assert!(!state.is_speaking());
        assert!(state.is_listening());
        assert!(!state.is_silent());
    }

    #[tokio::test]
    async fn await_silence_returns_immediately_when_idle() {
        let (state, _, _) = CoordinationState::new(Duration::from_millis(10));
        assert!(state.await_silence(Some(Duration::from_millis(1))).await);
    }

    #[tokio::test]
    async fn await_silence_times_out_while_speaking() {
        let (state, speaking, _) = CoordinationState::new(Duration::from_millis(10));
        speaking.set(true);

        let started = std::time::Instant::now();
        assert!(!state.await_silence(Some(Duration::from_millis(80))).await);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn await_silence_observes_flag_clearing() {
        let (state, speaking, _) = CoordinationState::new(Duration::from_millis(10));
        speaking.set(true);

        let clear = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            speaking.set(false);
            speaking
        });

        assert!(state.await_silence(Some(Duration::from_secs(2))).await);
        clear.await.unwrap();
    }
}
