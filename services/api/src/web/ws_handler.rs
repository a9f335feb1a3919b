//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a chat WebSocket
//! connection. One connection is one chat session: it owns its
//! `SessionContext` and handles inbound messages strictly one at a time, so a
//! streamed answer always finishes before the next message is looked at.

use crate::{
    error::ApiError,
    web::{
        middleware::AuthUser,
        protocol::{ClientMessage, ServerMessage},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{self, SplitSink, Stream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tutor_core::ports::TextStream;
use tutor_core::tutor::{Reply, SessionContext, RETRY_MESSAGE};

type WsSender = SplitSink<WebSocket, Message>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(username)): Extension<AuthUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, username))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, username: String) {
    info!("New chat connection for user: {}", username);
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Session Opening ---
    let opening = app_state.tutor.open_session(&username).await;
    let mut session = opening.session;
    let welcome = ServerMessage::Welcome {
        username: username.clone(),
    };
    if let Err(e) = send(&mut sender, &welcome).await {
        error!("Failed to send welcome message: {}", e);
        return;
    }
    for content in opening.messages {
        if let Err(e) = send(&mut sender, &ServerMessage::Notice { content }).await {
            error!("Failed to send opening message: {}", e);
            return;
        }
    }

    // --- 2. Main Message Loop ---
    while let Some(frame) = receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error for {}: {}", username, e);
                break;
            }
        };
        let result = match msg {
            Message::Text(text) => handle_text_message(text.as_str(), &app_state, &mut session, &mut sender).await,
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            error!("Chat connection for {} failed: {}", username, e);
            break;
        }
    }

    // --- 3. Cleanup ---
    info!(
        "Chat connection for {} closed after {} interactions.",
        username, session.interaction_count
    );
}

/// Handles one client frame to completion.
async fn handle_text_message(
    text: &str,
    app_state: &AppState,
    session: &mut SessionContext,
    sender: &mut WsSender,
) -> Result<(), ApiError> {
    let content = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Message { content }) => content,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let reply = ServerMessage::Error {
                message: "Unrecognised message.".to_string(),
            };
            return send(sender, &reply).await;
        }
    };

    match app_state.tutor.handle_message(session, &content).await {
        Reply::Notice(content) => send(sender, &ServerMessage::Notice { content }).await,
        Reply::Answer { stream, .. } => {
            let mut frames = std::pin::pin!(answer_frames(stream));
            while let Some(frame) = frames.next().await {
                send(sender, &frame).await?;
            }
            Ok(())
        }
    }
}

/// Frames for a streamed answer: one `answer_chunk` per piece, then
/// `answer_end`. A failing stream ends the answer early and is followed by
/// the retry notice.
pub fn answer_frames(stream: TextStream) -> impl Stream<Item = ServerMessage> + Send {
    stream::unfold(Some(stream), |state| async move {
        let Some(mut stream) = state else {
            return None;
        };
        match stream.next().await {
            Some(Ok(content)) => Some((vec![ServerMessage::AnswerChunk { content }], Some(stream))),
            Some(Err(e)) => {
                error!("Answer stream failed: {}", e);
                let retry = ServerMessage::Notice {
                    content: RETRY_MESSAGE.to_string(),
                };
                Some((vec![ServerMessage::AnswerEnd, retry], None))
            }
            None => Some((vec![ServerMessage::AnswerEnd], None)),
        }
    })
    .flat_map(stream::iter)
}

async fn send(sender: &mut WsSender, msg: &ServerMessage) -> Result<(), ApiError> {
    let json = serde_json::to_string(msg).map_err(|e| ApiError::Internal(e.to_string()))?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::ports::{PortError, PortResult};

    fn text_stream(pieces: Vec<PortResult<String>>) -> TextStream {
        Box::pin(stream::iter(pieces))
    }

    fn chunk(content: &str) -> ServerMessage {
        ServerMessage::AnswerChunk {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn answer_pieces_become_chunks_then_end() {
        let frames: Vec<ServerMessage> =
            answer_frames(text_stream(vec![Ok("Due ".to_string()), Ok("Friday.".to_string())]))
                .collect()
                .await;
        assert_eq!(frames, vec![chunk("Due "), chunk("Friday."), ServerMessage::AnswerEnd]);
    }

    #[tokio::test]
    async fn broken_stream_ends_the_answer_then_asks_to_retry() {
        let frames: Vec<ServerMessage> = answer_frames(text_stream(vec![
            Ok("The deadline ".to_string()),
            Err(PortError::Unexpected("connection reset".to_string())),
            Ok("never sent".to_string()),
        ]))
        .collect()
        .await;
        assert_eq!(
            frames,
            vec![
                chunk("The deadline "),
                ServerMessage::AnswerEnd,
                ServerMessage::Notice {
                    content: RETRY_MESSAGE.to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn empty_stream_still_ends_the_answer() {
        let frames: Vec<ServerMessage> = answer_frames(text_stream(Vec::new())).collect().await;
        assert_eq!(frames, vec![ServerMessage::AnswerEnd]);
    }
}
