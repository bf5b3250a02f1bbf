use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a webhook delivery from the platform.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: String,
    pub events: Vec<Event>,
}

/// A single platform event. Only the fields the relay reads are typed; the
/// rest is carried through `extra` so re-encoding keeps every field.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<EventMessage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One deferred unit of work: `data` is base64(JSON(event)).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub name: String,
    pub target: String,
    pub data: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Text { text: String },
}

impl OutgoingMessage {
    pub fn text(text: &str) -> Self {
        OutgoingMessage::Text {
            text: text.to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub reply_token: String,
    pub messages: Vec<OutgoingMessage>,
}
