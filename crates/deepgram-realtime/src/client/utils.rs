use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::client::config::Config;
use crate::client::consts::AUTHORIZATION_HEADER;

/// Builds the websocket upgrade request for `path` (`speak` or `listen`).
pub fn build_request(
    config: &Config,
    path: &str,
    query: &[(&str, String)],
) -> tokio_tungstenite::tungstenite::Result<Request> {
    let query = query
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut request = format!("{}/{}?{}", config.base_url(), path, query).into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION_HEADER,
        format!("Token {}", config.api_key().expose_secret())
            .as_str()
            .parse()?,
    );
    Ok(request)
}
