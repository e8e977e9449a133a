//! Seams to the physical audio hardware.
//!
//! Audio crossing these traits is PCM16 little-endian mono bytes: at the
//! output sample rate for [`OutputDevice`], and at the recognition sample
//! rate for [`InputDevice`].

use async_trait::async_trait;

use crate::error::AudioError;

/// The single audio sink. Only the playback worker ever holds it.
#[async_trait]
pub trait OutputDevice: Send {
    /// Opens the hardware stream. Called once, synchronously, while the
    /// playback engine is being constructed.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Queues audio for playback, suspending while the device buffer is full.
    async fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError>;

    /// Waits until everything written so far has been played.
    async fn drain(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn close(&mut self) {}
}

/// The microphone. Only the capture thread ever holds it.
pub trait InputDevice: Send {
    /// Opens the hardware stream. Called once during recognizer construction.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Blocks for the next fixed-size frame.
    ///
    /// `Ok(None)` means no frame arrived within the device's own read
    /// timeout; the caller is expected to check for shutdown and call again.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, AudioError>;

    fn close(&mut self) {}
}
