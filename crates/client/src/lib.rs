//! WebSocket subscriber for live turn streams.
//!
//! Connects to the engine's per-execution relay endpoint, decodes
//! [`StreamEvent`]s, and can fold a whole stream into the turn's outcome.

use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use reverie_protocol::{SceneStateData, StreamEvent};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed event: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("stream closed before a terminal event")]
    Incomplete,
}

/// Final outcome of one turn as observed over the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed {
        text: String,
        image_ref: Option<String>,
        final_scene: SceneStateData,
    },
    Failed {
        message: String,
        /// Whatever reply text streamed before the failure.
        partial_text: String,
    },
}

/// Live subscription to one execution's event stream.
pub struct TurnStream {
    socket: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl TurnStream {
    /// Connect to a relay endpoint, e.g. `ws://host:3000/ws/turns/{execution_id}`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _) = connect_async(url).await?;
        Ok(Self { socket })
    }

    /// Next decoded event, or `None` once the server closes the stream.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, ClientError> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Text(payload) => return Ok(Some(decode_event(payload.as_str())?)),
                Message::Close(_) => return Ok(None),
                // Tungstenite answers pings itself.
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Drain the stream and fold it into the turn's outcome.
    pub async fn collect(mut self) -> Result<TurnOutcome, ClientError> {
        let mut builder = OutcomeBuilder::new();
        while let Some(event) = self.next_event().await? {
            if let Some(outcome) = builder.apply(event) {
                return Ok(outcome);
            }
        }
        Err(ClientError::Incomplete)
    }
}

fn decode_event(payload: &str) -> Result<StreamEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Accumulates tokens until a terminal event resolves the outcome.
#[derive(Default)]
pub struct OutcomeBuilder {
    text: String,
}

impl OutcomeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streamed text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fold in one event; returns the outcome once a terminal event arrives.
    pub fn apply(&mut self, event: StreamEvent) -> Option<TurnOutcome> {
        match event {
            StreamEvent::Token { text } => {
                self.text.push_str(&text);
                None
            }
            StreamEvent::Progress {
                status,
                progress,
                current_step,
            } => {
                tracing::debug!(%status, progress, %current_step, "turn progress");
                None
            }
            StreamEvent::Complete {
                text,
                image_ref,
                final_scene,
            } => Some(TurnOutcome::Completed {
                text,
                image_ref,
                final_scene,
            }),
            StreamEvent::Error { message } => Some(TurnOutcome::Failed {
                message,
                partial_text: std::mem::take(&mut self.text),
            }),
        }
    }
}
