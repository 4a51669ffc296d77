//! Outbound webhook wire format.
//!
//! The receiver expects the legacy chat-attachment shape:
//!
//! ```json
//! {"text": "...", "attachments": [{"fallback": "...", "color": "#FF0000",
//!   "title": "...", "title_link": "...",
//!   "fields": [{"short": true, "title": "Method", "value": "GET"}]}]}
//! ```
//!
//! Field names and nesting must not change.

use serde::Serialize;

use logwatch_core::AlertMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub fallback: String,
    pub color: String,
    pub title: String,
    /// Empty when no link base is configured.
    pub title_link: String,
    pub fields: Vec<AttachmentField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentField {
    pub short: bool,
    pub title: String,
    pub value: String,
}

impl From<&AlertMessage> for WebhookPayload {
    fn from(message: &AlertMessage) -> Self {
        Self {
            text: message.text.clone(),
            attachments: vec![Attachment {
                fallback: format!("{} - {}", message.title, message.text),
                color: message.color.as_hex().to_string(),
                title: message.title.clone(),
                title_link: message.title_link.clone().unwrap_or_default(),
                fields: message
                    .fields
                    .iter()
                    .map(|f| AttachmentField {
                        short: f.short,
                        title: f.title.clone(),
                        value: f.value.clone(),
                    })
                    .collect(),
            }],
        }
    }
}
