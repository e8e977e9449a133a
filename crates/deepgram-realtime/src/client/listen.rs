use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::client::config::Config;
use crate::client::consts::{EVENT_CHANNEL_CAPACITY, KEEPALIVE_INTERVAL, LISTEN_PATH};
use crate::client::options::ListenOptions;
use crate::client::{WsStream, open, utils};
use crate::error::Error;
use crate::types::{ListenClientMessage, ListenServerMessage};

/// A live speech-to-text websocket.
///
/// Audio is pulled from the channel handed to [`connect`]; dropping that
/// channel's sender ends the stream. Server events are read with
/// [`next_event`](Self::next_event), which returns `None` once the socket
/// has closed.
pub struct ListenConnection {
    events: mpsc::Receiver<ListenServerMessage>,
    recv_task: JoinHandle<()>,
}

impl ListenConnection {
    pub async fn next_event(&mut self) -> Option<ListenServerMessage> {
        self.events.recv().await
    }
}

impl Drop for ListenConnection {
    fn drop(&mut self) {
        // The send task finishes on its own once the audio channel closes.
        self.recv_task.abort();
    }
}

pub async fn connect(
    config: &Config,
    options: &ListenOptions,
    audio: mpsc::Receiver<Vec<u8>>,
) -> Result<ListenConnection, Error> {
    let request = utils::build_request(config, LISTEN_PATH, &options.query())?;
    let ws = open(request).await?;
    tracing::info!(
        "listen socket open (model {}, language {})",
        options.model(),
        options.language()
    );

    let (write, read) = ws.split();
    let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(send_audio(write, audio, KEEPALIVE_INTERVAL));
    let recv_task = tokio::spawn(receive_events(read, tx));

    Ok(ListenConnection { events, recv_task })
}

async fn send_control(
    write: &mut SplitSink<WsStream, Message>,
    message: ListenClientMessage,
) -> Result<(), Error> {
    let text = serde_json::to_string(&message)?;
    write.send(Message::Text(text)).await?;
    Ok(())
}

// Forwards audio frames, keeping the socket alive while the microphone is gated.
async fn send_audio(
    mut write: SplitSink<WsStream, Message>,
    mut audio: mpsc::Receiver<Vec<u8>>,
    keepalive: Duration,
) {
    let mut frames = 0u64;
    loop {
        match tokio::time::timeout(keepalive, audio.recv()).await {
            Ok(Some(frame)) => {
                if let Err(e) = write.send(Message::Binary(frame)).await {
                    tracing::error!("failed to send audio: {}", e);
                    break;
                }
                frames += 1;
            }
            Ok(None) => {
                tracing::debug!("audio channel closed after {} frames", frames);
                if let Err(e) = send_control(&mut write, ListenClientMessage::CloseStream).await {
                    tracing::warn!("failed to send CloseStream: {}", e);
                }
                break;
            }
            Err(_) => {
                tracing::debug!("no audio for {:?}, sending KeepAlive", keepalive);
                if let Err(e) = send_control(&mut write, ListenClientMessage::KeepAlive).await {
                    tracing::error!("failed to send KeepAlive: {}", e);
                    break;
                }
            }
        }
    }
    let _ = write.close().await;
}

async fn receive_events(
    mut read: SplitStream<WsStream>,
    tx: mpsc::Sender<ListenServerMessage>,
) {
    while let Some(message) = read.next().await {
        let message = match message {
            Err(e) => {
                tracing::error!("failed to read message: {}", e);
                break;
            }
            Ok(message) => message,
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<ListenServerMessage>(&text) {
                Ok(ListenServerMessage::Unknown) => {
                    tracing::debug!("ignoring message: {}", text);
                }
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                }
            },
            Message::Binary(bin) => {
                tracing::warn!("unexpected binary message: {} bytes", bin.len());
            }
            Message::Close(reason) => {
                tracing::info!("connection closed: {:?}", reason);
                break;
            }
            _ => {}
        }
    }
}
