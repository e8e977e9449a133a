//! Microphone capture on top of cpal.
//!
//! The cpal callback downmixes to mono and hands samples to the capture
//! thread, which resamples them and cuts fixed-size PCM16 frames.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::DeviceTrait;
use cpal::{FrameCount, StreamConfig};
use interview_audio::{AudioError, InputDevice};
use interview_native_utils::audio::{StreamResampler, ToBinary, downmix};
use interview_native_utils::stream::{StreamHandle, spawn_stream};

use crate::config::INPUT_CHUNK_SIZE;

/// Callback buffers held between the cpal thread and the capture thread.
const CALLBACK_QUEUE: usize = 256;
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Resamples raw callback buffers and slices them into frames.
struct FrameBuffer {
    resampler: StreamResampler,
    pending: Vec<f32>,
    frame_samples: usize,
}

impl FrameBuffer {
    fn new(resampler: StreamResampler, frame_samples: usize) -> Self {
        Self {
            resampler,
            pending: Vec::with_capacity(frame_samples * 4),
            frame_samples,
        }
    }

    fn push(&mut self, samples: &[f32]) {
        let resampled = self.resampler.process(samples);
        self.pending.extend_from_slice(&resampled);
    }

    fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.pending.len() < self.frame_samples {
            return None;
        }
        let frame: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
        Some(frame.to_binary())
    }
}

struct Running {
    samples: Receiver<Vec<f32>>,
    frames: FrameBuffer,
    stream: StreamHandle,
}

/// The default (or a named) input device, producing frames of
/// `frame_samples` samples at `target_rate`.
pub struct CpalInput {
    device_name: Option<String>,
    target_rate: u32,
    frame_samples: usize,
    running: Option<Running>,
}

impl CpalInput {
    pub fn new(device_name: Option<String>, target_rate: u32, frame_samples: usize) -> Self {
        Self {
            device_name,
            target_rate,
            frame_samples,
            running: None,
        }
    }
}

impl InputDevice for CpalInput {
    fn start(&mut self) -> Result<(), AudioError> {
        let open_err = |e: anyhow::Error| AudioError::DeviceOpen(format!("{e:#}"));

        let device =
            interview_native_utils::device::get_or_default_input(self.device_name.as_deref())
                .map_err(open_err)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using input device: {:?}", name);
        if let Ok(configs) = device.supported_input_configs() {
            for config in configs {
                tracing::debug!("Supported input config: {:?}", config);
            }
        }

        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::DeviceOpen(format!("no default input config: {e}")))?;
        // Default channels and sample rate, but with a fixed buffer size.
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
        };
        tracing::info!("Input stream config: {:?}", &config);

        let channels = config.channels as usize;
        let device_rate = config.sample_rate.0;
        let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(CALLBACK_QUEUE);

        let stream = spawn_stream("audio-input", move || {
            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Err(e) = tx.try_send(downmix(data, channels)) {
                        tracing::warn!("Failed to send audio data to buffer: {:?}", e);
                    }
                },
                move |err| tracing::error!("An error occurred on input stream: {}", err),
                None,
            )?;
            Ok(stream)
        })
        .map_err(open_err)?;

        let resampler = StreamResampler::new(device_rate, self.target_rate, INPUT_CHUNK_SIZE)
            .map_err(open_err)?;

        self.running = Some(Running {
            samples: rx,
            frames: FrameBuffer::new(resampler, self.frame_samples),
            stream,
        });
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, AudioError> {
        let running = self
            .running
            .as_mut()
            .ok_or_else(|| AudioError::Device("input stream is not running".to_string()))?;

        loop {
            if let Some(frame) = running.frames.next_frame() {
                return Ok(Some(frame));
            }
            match running.samples.recv_timeout(READ_TIMEOUT) {
                Ok(samples) => running.frames.push(&samples),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AudioError::Device("input stream stopped".to_string()));
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.stream.stop();
            tracing::info!("Input stream stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_cut_at_the_frame_size() {
        let resampler = StreamResampler::new(16_000, 16_000, 320).unwrap();
        let mut frames = FrameBuffer::new(resampler, 320);

        frames.push(&[0.5; 500]);
        let frame = frames.next_frame().unwrap();
        assert_eq!(frame.len(), 640);
        assert_eq!(&frame[..2], &16384i16.to_le_bytes());
        assert!(frames.next_frame().is_none());

        frames.push(&[0.0; 140]);
        assert!(frames.next_frame().is_some());
        assert!(frames.next_frame().is_none());
    }

    #[test]
    fn test_read_before_start_is_a_device_error() {
        let mut input = CpalInput::new(None, 16_000, 320);
        assert!(matches!(input.read_frame(), Err(AudioError::Device(_))));
    }
}
