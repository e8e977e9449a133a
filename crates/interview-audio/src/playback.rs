//! Sequential playback through the single output device.
//!
//! A [`PlaybackEngine`] owns the device through one worker task. Jobs are
//! played strictly in the order they were enqueued; a job that fails is
//! logged and dropped without affecting the next one.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{OverflowPolicy, PlaybackConfig};
use crate::coordination::SpeakingFlag;
use crate::device::OutputDevice;
use crate::error::AudioError;
use crate::filler::{Clip, FillerLibrary};
use crate::job::{LiveStream, PlaybackJob, silence};

enum QueueItem {
    Job(PlaybackJob),
    Stop,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub enqueued: u64,
    pub completed: u64,
    pub failed: u64,
}

pub struct PlaybackEngine {
    tx: mpsc::Sender<QueueItem>,
    /// Jobs enqueued but not yet finished, including the one playing.
    pending: Arc<watch::Sender<usize>>,
    counters: Arc<Counters>,
    speaking: Arc<SpeakingFlag>,
    worker: Mutex<Option<JoinHandle<Box<dyn OutputDevice>>>>,
    closed: AtomicBool,
    config: PlaybackConfig,
}

impl PlaybackEngine {
    /// Opens the device and spawns the playback worker.
    ///
    /// Must be called from within a tokio runtime. A device that fails to
    /// open is reported immediately as [`AudioError::DeviceOpen`].
    pub fn start(
        mut device: Box<dyn OutputDevice>,
        speaking: SpeakingFlag,
        fillers: FillerLibrary,
        config: PlaybackConfig,
    ) -> Result<Self, AudioError> {
        device.start()?;

        let (tx, rx) = mpsc::channel(config.max_pending_jobs.max(1));
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        let counters = Arc::new(Counters::default());
        let speaking = Arc::new(speaking);

        let worker = Worker {
            device,
            rx,
            speaking: speaking.clone(),
            pending: pending.clone(),
            counters: counters.clone(),
            fillers,
            config: config.clone(),
        };
        let worker = tokio::spawn(worker.run());
        tracing::info!("Playback engine started");

        Ok(Self {
            tx,
            pending,
            counters,
            speaking,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
            config,
        })
    }

    /// Appends a job to the queue.
    ///
    /// Waits for room when the queue is full under [`OverflowPolicy::Block`];
    /// fails with [`AudioError::QueueFull`] under [`OverflowPolicy::Reject`].
    pub async fn enqueue(&self, job: PlaybackJob) -> Result<(), AudioError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AudioError::Closed);
        }

        let kind = job.kind();
        self.pending.send_modify(|n| *n += 1);
        let sent = match self.config.overflow {
            OverflowPolicy::Block => self
                .tx
                .send(QueueItem::Job(job))
                .await
                .map_err(|_| AudioError::Closed),
            OverflowPolicy::Reject => {
                self.tx
                    .try_send(QueueItem::Job(job))
                    .map_err(|e| match e {
                        TrySendError::Full(_) => {
                            AudioError::QueueFull(self.config.max_pending_jobs)
                        }
                        TrySendError::Closed(_) => AudioError::Closed,
                    })
            }
        };

        match sent {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Enqueued {} job ({} pending)", kind, *self.pending.borrow());
                Ok(())
            }
            Err(e) => {
                self.pending.send_modify(|n| *n = n.saturating_sub(1));
                Err(e)
            }
        }
    }

    pub async fn schedule_filler(&self, duration: Duration) -> Result<(), AudioError> {
        self.enqueue(PlaybackJob::SilenceFiller(duration)).await
    }

    /// Returns once every job enqueued so far has finished playing.
    pub async fn wait_for_drain(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops the worker after the jobs already queued, then releases the device.
    ///
    /// The worker gets `close_timeout` to finish; after that it is aborted.
    /// Calling this more than once is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut worker) = self.worker.lock().await.take() else {
            return;
        };
        tracing::info!("Closing playback engine...");

        // One deadline covers both the stop signal and the worker shutdown.
        let deadline = tokio::time::Instant::now() + self.config.close_timeout;
        if tokio::time::timeout_at(deadline, self.tx.send(QueueItem::Stop))
            .await
            .is_err()
        {
            tracing::warn!("Playback queue stayed full; stop signal not delivered");
        }

        match tokio::time::timeout_at(deadline, &mut worker).await {
            Ok(Ok(mut device)) => {
                device.close();
                tracing::info!("Playback engine closed.");
            }
            Ok(Err(e)) => {
                tracing::error!("Playback worker ended abnormally: {}", e);
            }
            Err(_) => {
                tracing::warn!("Playback worker did not shut down gracefully; aborting it.");
                worker.abort();
                let _ = worker.await;
            }
        }

        self.speaking.set(false);
        self.pending.send_replace(0);
    }
}

struct Worker {
    device: Box<dyn OutputDevice>,
    rx: mpsc::Receiver<QueueItem>,
    speaking: Arc<SpeakingFlag>,
    pending: Arc<watch::Sender<usize>>,
    counters: Arc<Counters>,
    fillers: FillerLibrary,
    config: PlaybackConfig,
}

impl Worker {
    async fn run(mut self) -> Box<dyn OutputDevice> {
        while let Some(item) = self.rx.recv().await {
            let job = match item {
                QueueItem::Job(job) => job,
                QueueItem::Stop => {
                    tracing::debug!("Playback worker received stop signal");
                    break;
                }
            };

            let kind = job.kind();
            self.speaking.set(true);
            let played = self.play(job).await;
            // Keep the speaking flag up until the device has emptied its buffer.
            let drained = self.device.drain().await;
            self.speaking.set(false);

            match played.and(drained) {
                Ok(()) => {
                    self.counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Error processing {} audio job: {}", kind, e);
                }
            }
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }
        self.device
    }

    async fn play(&mut self, job: PlaybackJob) -> Result<(), AudioError> {
        match job {
            PlaybackJob::PrerecordedClip(path) => self.play_clip(&path).await,
            PlaybackJob::LiveStream(stream) => self.play_stream(stream).await,
            PlaybackJob::SilenceFiller(duration) => self.play_filler(duration).await,
        }
    }

    async fn play_clip(&mut self, path: &Path) -> Result<(), AudioError> {
        tracing::info!("Playing audio file: {}", path.display());
        let owned = path.to_path_buf();
        let clip = tokio::task::spawn_blocking(move || Clip::load(&owned))
            .await
            .map_err(|e| AudioError::Device(format!("clip loader stopped: {e}")))??;
        if clip.sample_rate != self.config.sample_rate {
            tracing::warn!(
                "Clip {} is {} Hz, output runs at {} Hz",
                path.display(),
                clip.sample_rate,
                self.config.sample_rate
            );
        }

        for chunk in clip.chunks(self.config.clip_chunk_frames) {
            self.device.write(&chunk).await?;
            tokio::time::sleep(self.config.clip_yield).await;
        }
        tracing::debug!("Clip playback completed: {} frames", clip.samples.len());
        Ok(())
    }

    async fn play_stream(&mut self, mut stream: LiveStream) -> Result<(), AudioError> {
        tracing::info!("Playing audio from live stream...");
        let mut chunks = 0usize;
        while let Some(chunk) = stream.next_chunk().await {
            self.device.write(&chunk).await?;
            chunks += 1;
        }
        tracing::debug!("Live stream ended after {} chunks", chunks);
        Ok(())
    }

    async fn play_filler(&mut self, duration: Duration) -> Result<(), AudioError> {
        if let Some(path) = self.fillers.choose().map(Path::to_path_buf) {
            match self.play_clip(&path).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("Filler clip failed ({}); playing silence instead", e),
            }
        }
        let zeros = silence(duration, self.config.sample_rate);
        self.device.write(&zeros).await
    }
}
