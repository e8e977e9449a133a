use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered the websocket upgrade with a non-101 status.
    #[error("handshake rejected with HTTP status {0}")]
    Handshake(u16),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("failed to encode or decode message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server error {code}: {message}")]
    Server { code: String, message: String },
    #[error("connection closed")]
    Closed,
}

impl Error {
    /// Maps a failed connect attempt, pulling the HTTP status out of a
    /// rejected upgrade.
    pub(crate) fn from_connect(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => Error::Handshake(response.status().as_u16()),
            other => Error::WebSocket(other),
        }
    }
}
