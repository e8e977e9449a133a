use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

/// One unit of work for the playback worker.
#[derive(Debug)]
pub enum PlaybackJob {
    /// A finite WAV asset on disk.
    PrerecordedClip(PathBuf),
    /// Audio that is still being produced, terminated by [`StreamFrame::End`].
    LiveStream(LiveStream),
    /// A filler of roughly this length: a cached clip when available, silence otherwise.
    SilenceFiller(Duration),
}

impl PlaybackJob {
    /// Creates a live-stream job and the sender that feeds it.
    pub fn live() -> (LiveStreamSender, PlaybackJob) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            LiveStreamSender { tx: Some(tx) },
            PlaybackJob::LiveStream(LiveStream { rx }),
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackJob::PrerecordedClip(_) => "clip",
            PlaybackJob::LiveStream(_) => "live",
            PlaybackJob::SilenceFiller(_) => "filler",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Raw PCM16 little-endian bytes.
    Audio(Vec<u8>),
    End,
}

/// Receiving half of a live stream, owned by the playback worker.
#[derive(Debug)]
pub struct LiveStream {
    rx: mpsc::UnboundedReceiver<StreamFrame>,
}

impl LiveStream {
    /// Next chunk of audio, or `None` once the stream has ended.
    ///
    /// A dropped sender counts as the end of the stream.
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        match self.rx.recv().await {
            Some(StreamFrame::Audio(chunk)) => Some(chunk),
            Some(StreamFrame::End) | None => None,
        }
    }
}

/// Producing half of a live stream.
///
/// The end-of-stream marker is sent by [`finish`](Self::finish) or, failing
/// that, when the sender is dropped.
#[derive(Debug)]
pub struct LiveStreamSender {
    tx: Option<mpsc::UnboundedSender<StreamFrame>>,
}

impl LiveStreamSender {
    /// Returns `false` if playback has already discarded the stream.
    pub fn send(&self, chunk: Vec<u8>) -> bool {
        match &self.tx {
            Some(tx) => tx.send(StreamFrame::Audio(chunk)).is_ok(),
            None => false,
        }
    }

    pub fn finish(mut self) {
        self.end();
    }

    fn end(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(StreamFrame::End);
        }
    }
}

impl Drop for LiveStreamSender {
    fn drop(&mut self) {
        self.end();
    }
}

/// Zeroed PCM16 mono bytes covering `duration` at `sample_rate`.
pub fn silence(duration: Duration, sample_rate: u32) -> Vec<u8> {
    let samples = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
    vec![0u8; samples * 2]
}
