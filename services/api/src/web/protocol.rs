//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser chat client and
//! the API server. Every frame is a JSON text frame tagged by `type`.

use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A chat message: either a slash command or a question/topic.
    Message { content: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once when the connection opens.
    Welcome { username: String },

    /// A complete message from the assistant: command replies, status lines, help.
    Notice { content: String },

    /// The next piece of a streamed model answer.
    AnswerChunk { content: String },

    /// The streamed answer is complete.
    AnswerEnd,

    /// The client sent something the server could not understand.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_tagged_snake_case() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"message","content":"/teacher"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Message { content: "/teacher".to_string() });

        let chunk = serde_json::to_value(ServerMessage::AnswerChunk { content: "Hi".to_string() }).unwrap();
        assert_eq!(chunk, serde_json::json!({"type": "answer_chunk", "content": "Hi"}));
        let end = serde_json::to_value(ServerMessage::AnswerEnd).unwrap();
        assert_eq!(end, serde_json::json!({"type": "answer_end"}));
    }

    #[test]
    fn unknown_client_messages_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"init"}"#).is_err());
    }
}
