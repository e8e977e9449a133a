use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::client::config::Config;
use crate::client::consts::SPEAK_PATH;
use crate::client::options::SpeakOptions;
use crate::client::{WsStream, open, utils};
use crate::error::Error;
use crate::types::{SpeakClientMessage, SpeakServerMessage};

/// What the speak socket produced next.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeakEvent {
    /// Raw audio in the requested encoding.
    Audio(Vec<u8>),
    Message(SpeakServerMessage),
    Closed,
}

/// One text-to-speech websocket.
pub struct SpeakClient {
    ws: WsStream,
    chunks_received: u64,
    bytes_received: u64,
}

impl SpeakClient {
    async fn send(&mut self, message: &SpeakClientMessage) -> Result<(), Error> {
        let text = serde_json::to_string(message)?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Queues text for synthesis. Nothing is spoken until [`flush`](Self::flush).
    pub async fn send_text(&mut self, text: &str) -> Result<(), Error> {
        self.send(&SpeakClientMessage::speak(text)).await
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        self.send(&SpeakClientMessage::Flush).await
    }

    pub async fn clear(&mut self) -> Result<(), Error> {
        self.send(&SpeakClientMessage::Clear).await
    }

    /// Waits for the next audio chunk or control message.
    ///
    /// An `Error` message from the server is returned as [`Error::Server`].
    pub async fn next_event(&mut self) -> Result<SpeakEvent, Error> {
        while let Some(message) = self.ws.next().await {
            match message? {
                Message::Binary(bin) => {
                    self.chunks_received += 1;
                    self.bytes_received += bin.len() as u64;
                    return Ok(SpeakEvent::Audio(bin));
                }
                Message::Text(text) => match serde_json::from_str::<SpeakServerMessage>(&text) {
                    Ok(SpeakServerMessage::Error(err)) => {
                        return Err(Error::Server {
                            code: err.err_code().to_string(),
                            message: err.err_msg().to_string(),
                        });
                    }
                    Ok(SpeakServerMessage::Warning(warning)) => {
                        tracing::warn!(
                            "speak warning {}: {}",
                            warning.code(),
                            warning.description()
                        );
                        return Ok(SpeakEvent::Message(SpeakServerMessage::Warning(warning)));
                    }
                    Ok(message) => {
                        tracing::debug!("received message: {:?}", message);
                        return Ok(SpeakEvent::Message(message));
                    }
                    Err(e) => {
                        tracing::error!("failed to deserialize message: {}, text=> {:?}", e, text);
                    }
                },
                Message::Close(reason) => {
                    tracing::info!("connection closed: {:?}", reason);
                    return Ok(SpeakEvent::Closed);
                }
                _ => {}
            }
        }
        Ok(SpeakEvent::Closed)
    }

    /// Audio chunks and bytes received so far.
    pub fn received(&self) -> (u64, u64) {
        (self.chunks_received, self.bytes_received)
    }

    /// Sends `Close` and shuts the socket down.
    pub async fn close(mut self) -> Result<(), Error> {
        self.send(&SpeakClientMessage::Close).await?;
        self.ws.close(None).await?;
        tracing::debug!(
            "speak socket closed after {} chunks ({} bytes)",
            self.chunks_received,
            self.bytes_received
        );
        Ok(())
    }
}

pub async fn connect(config: &Config, options: &SpeakOptions) -> Result<SpeakClient, Error> {
    let request = utils::build_request(config, SPEAK_PATH, &options.query())?;
    let ws = open(request).await?;
    tracing::info!("speak socket open (model {})", options.model());
    Ok(SpeakClient {
        ws,
        chunks_received: 0,
        bytes_received: 0,
    })
}
