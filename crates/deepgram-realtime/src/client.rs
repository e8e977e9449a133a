use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::Error;

pub mod config;
pub mod consts;
pub mod listen;
pub mod options;
pub mod speak;
mod utils;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Opens the websocket, turning a rejected upgrade into `Error::Handshake`.
async fn open(request: Request) -> Result<WsStream, Error> {
    let uri = request.uri().clone();
    let (ws_stream, response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(Error::from_connect)?;
    tracing::debug!(
        "connected to {}{}: {}",
        uri.host().unwrap_or("?"),
        uri.path(),
        response.status()
    );
    Ok(ws_stream)
}
