//! `cpal::Stream` is not `Send` on every platform, so it cannot live inside
//! a struct that async tasks move around. [`spawn_stream`] builds and plays
//! the stream on a thread of its own and keeps it there until the returned
//! handle is stopped or dropped.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::anyhow;
use cpal::traits::StreamTrait;

pub struct StreamHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Stops the stream and waits for its thread to exit.
    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Audio stream thread panicked");
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs `build` on a new thread named `name` and starts the stream it returns.
///
/// Blocks until the stream is playing, so device errors surface here rather
/// than on the stream thread.
pub fn spawn_stream<F>(name: &str, build: F) -> anyhow::Result<StreamHandle>
where
    F: FnOnce() -> anyhow::Result<cpal::Stream> + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<()>>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let stream = match build().and_then(|stream| {
                stream.play()?;
                Ok(stream)
            }) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            // Returns once the handle drops its sender.
            let _ = stop_rx.recv();
            drop(stream);
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => {
            tracing::debug!("Audio stream {} running", name);
            Ok(StreamHandle {
                stop: Some(stop_tx),
                thread: Some(thread),
            })
        }
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => Err(anyhow!("audio stream thread {name} exited before starting")),
    }
}
