//! Speaker output on top of cpal.
//!
//! PCM16 audio from the playback worker is converted to f32, resampled to the
//! device rate, and pushed into a ring buffer that the cpal callback drains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::DeviceTrait;
use cpal::{FrameCount, StreamConfig};
use interview_audio::{AudioError, OutputDevice};
use interview_native_utils::audio::{StreamResampler, pcm16_to_f32, shared_buffer};
use interview_native_utils::stream::{StreamHandle, spawn_stream};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd};

use crate::config::{OUTPUT_CHUNK_SIZE, OUTPUT_LATENCY_MS};

const PUSH_RETRY: Duration = Duration::from_millis(5);
const DRAIN_POLL: Duration = Duration::from_millis(10);
/// Extra time `drain` allows beyond what the buffered audio should take.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Copies one mono sample into every channel of each frame.
/// Returns how many samples were taken from the ring buffer.
fn fill_frames(data: &mut [f32], channels: usize, consumer: &mut HeapCons<f32>) -> usize {
    let mut popped = 0;
    for frame in data.chunks_mut(channels.max(1)) {
        let sample = match consumer.try_pop() {
            Some(sample) => {
                popped += 1;
                sample
            }
            None => 0.0,
        };
        frame.fill(sample);
    }
    popped
}

struct Running {
    producer: HeapProd<f32>,
    resampler: StreamResampler,
    /// Set by the callback when it played nothing but silence.
    idle: Arc<AtomicBool>,
    device_rate: u32,
    stream: StreamHandle,
}

/// The default (or a named) output device, fed at `source_rate`.
pub struct CpalOutput {
    device_name: Option<String>,
    source_rate: u32,
    running: Option<Running>,
}

impl CpalOutput {
    pub fn new(device_name: Option<String>, source_rate: u32) -> Self {
        Self {
            device_name,
            source_rate,
            running: None,
        }
    }

    fn running(&mut self) -> Result<&mut Running, AudioError> {
        self.running
            .as_mut()
            .ok_or_else(|| AudioError::Device("output stream is not running".to_string()))
    }
}

async fn push_all(running: &mut Running, samples: &[f32]) {
    let mut remaining = samples;
    while !remaining.is_empty() {
        let pushed = running.producer.push_slice(remaining);
        if pushed > 0 {
            running.idle.store(false, Ordering::Release);
            remaining = &remaining[pushed..];
        }
        if !remaining.is_empty() {
            tokio::time::sleep(PUSH_RETRY).await;
        }
    }
}

#[async_trait]
impl OutputDevice for CpalOutput {
    fn start(&mut self) -> Result<(), AudioError> {
        let open_err = |e: anyhow::Error| AudioError::DeviceOpen(format!("{e:#}"));

        let device = interview_native_utils::device::get_or_default_output(
            self.device_name.as_deref(),
        )
        .map_err(open_err)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using output device: {:?}", name);

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceOpen(format!("no default output config: {e}")))?;
        // Create a stream config with a fixed buffer size.
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
        };
        tracing::info!("Output stream config: {:?}", &config);

        let channels = config.channels as usize;
        let device_rate = config.sample_rate.0;
        let buffer = shared_buffer(device_rate as usize * OUTPUT_LATENCY_MS / 1000);
        let (producer, mut consumer) = buffer.split();

        let idle = Arc::new(AtomicBool::new(true));
        let callback_idle = idle.clone();
        let stream = spawn_stream("audio-output", move || {
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let popped = fill_frames(data, channels, &mut consumer);
                    callback_idle.store(popped == 0, Ordering::Release);
                },
                move |err| tracing::error!("An error occurred on output stream: {}", err),
                None,
            )?;
            Ok(stream)
        })
        .map_err(open_err)?;

        let resampler = StreamResampler::new(self.source_rate, device_rate, OUTPUT_CHUNK_SIZE)
            .map_err(open_err)?;

        self.running = Some(Running {
            producer,
            resampler,
            idle,
            device_rate,
            stream,
        });
        Ok(())
    }

    async fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        let running = self.running()?;
        let samples = running.resampler.process(&pcm16_to_f32(pcm));
        push_all(running, &samples).await;
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), AudioError> {
        let running = self.running()?;
        let tail = running.resampler.flush();
        push_all(running, &tail).await;

        let buffered = running.producer.occupied_len() as f64 / running.device_rate as f64;
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs_f64(buffered) + DRAIN_GRACE;
        while !(running.producer.is_empty() && running.idle.load(Ordering::Acquire)) {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    "Output device did not drain in time, {} samples left",
                    running.producer.occupied_len()
                );
                break;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.stream.stop();
            tracing::info!("Output stream stopped");
        }
    }
}
