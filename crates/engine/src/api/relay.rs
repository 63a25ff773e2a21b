//! WebSocket streaming relay.
//!
//! One subscriber per execution. The relay merges the live progress handle
//! with the durable record on a fixed poll interval, so a client that
//! connects mid-turn (or after a restart) still receives everything written
//! so far. Text is diffed by length, so re-polls never resend tokens.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use uuid::Uuid;

use reverie_domain::{ExecutionId, ExecutionRecord, ExecutionStatus, SceneState};
use reverie_protocol::{SceneStateData, StreamEvent};

use crate::app::App;
use crate::use_cases::turn::{TurnError, TurnProgress};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn ws_handler(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let execution_id = ExecutionId::from_uuid(id);
    ws.on_upgrade(move |socket| relay_loop(app, execution_id, socket))
}

async fn relay_loop(app: Arc<App>, execution_id: ExecutionId, mut socket: WebSocket) {
    let mut cursor = RelayCursor::new();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let progress = match app.turns.progress.execute(execution_id).await {
                    Ok(progress) => progress,
                    Err(TurnError::ExecutionNotFound) => {
                        let event = StreamEvent::Error {
                            message: "Execution not found".to_string(),
                        };
                        let _ = send_event(&mut socket, &event).await;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(%execution_id, error = %e, "relay poll failed");
                        continue;
                    }
                };
                let record = match app.executions.get(execution_id).await {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(%execution_id, error = %e, "relay record read failed");
                        continue;
                    }
                };

                let (events, terminal) = cursor.next_events(&progress, record.as_ref());
                for event in &events {
                    if send_event(&mut socket, event).await.is_err() {
                        return;
                    }
                }
                if terminal {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return,
                }
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}

async fn send_event(socket: &mut WebSocket, event: &StreamEvent) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "stream event serialization failed");
            return Ok(());
        }
    };
    socket.send(Message::Text(payload.into())).await
}

/// Tracks what one subscriber has already been sent.
pub struct RelayCursor {
    sent_text_len: usize,
    last_stage: Option<(ExecutionStatus, u8, String)>,
}

impl Default for RelayCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayCursor {
    pub fn new() -> Self {
        Self {
            sent_text_len: 0,
            last_stage: None,
        }
    }

    /// Events to emit for one poll. Returns the events in order plus whether
    /// the execution is terminal; after a terminal poll the connection closes.
    pub fn next_events(
        &mut self,
        progress: &TurnProgress,
        record: Option<&ExecutionRecord>,
    ) -> (Vec<StreamEvent>, bool) {
        let mut events = Vec::new();

        // The live handle sees tokens before the durable record does; take
        // whichever has advanced further.
        let text = match record {
            Some(record) if record.streamed_text.len() > progress.streamed_text.len() => {
                &record.streamed_text
            }
            _ => &progress.streamed_text,
        };
        if text.len() > self.sent_text_len {
            events.push(StreamEvent::Token {
                text: text[self.sent_text_len..].to_string(),
            });
            self.sent_text_len = text.len();
        }

        // Only the durable record decides terminality; if the live handle
        // went terminal first, the next poll sees the record write.
        if let Some(record) = record {
            if record.is_terminal() {
                events.push(self.terminal_event(record));
                return (events, true);
            }
        }

        let stage = (
            progress.status,
            progress.progress,
            progress.current_step.clone(),
        );
        if self.last_stage.as_ref() != Some(&stage) {
            events.push(StreamEvent::Progress {
                status: progress.status.as_str().to_string(),
                progress: progress.progress,
                current_step: progress.current_step.clone(),
            });
            self.last_stage = Some(stage);
        }

        (events, false)
    }

    fn terminal_event(&self, record: &ExecutionRecord) -> StreamEvent {
        if record.status == ExecutionStatus::Completed {
            let scene = record
                .result_scene
                .clone()
                .unwrap_or_else(|| SceneState::new("", "", ""));
            StreamEvent::Complete {
                text: record
                    .result_text
                    .clone()
                    .unwrap_or_else(|| record.streamed_text.clone()),
                image_ref: record.result_image_ref.clone(),
                final_scene: SceneStateData {
                    outfit: scene.outfit,
                    location: scene.location,
                    action: scene.action,
                },
            }
        } else {
            StreamEvent::Error {
                message: record
                    .error
                    .clone()
                    .unwrap_or_else(|| "Turn failed".to_string()),
            }
        }
    }
}
