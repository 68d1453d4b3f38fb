use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid server url '{0}'")]
    InvalidUrl(String),

    #[error("not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ClientError>;
