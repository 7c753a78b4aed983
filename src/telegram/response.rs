//! Bot API response translation
//!
//! All knowledge of Telegram's error envelope and its description strings
//! lives here, so upstream wording changes only touch this file.

use super::{RelayResult, TelegramError};
use reqwest::StatusCode;
use serde::Deserialize;

/// Error envelope returned with non-200 statuses
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error_code: i64,
    pub description: String,
}

/// Success envelope for `sendDocument`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendDocumentEnvelope {
    pub ok: bool,
    pub result: SentMessage,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SentMessage {
    pub message_id: i64,
    pub document: SentDocument,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SentDocument {
    pub file_id: String,
}

pub const UNAUTHORIZED_MESSAGE: &str =
    "Unauthorized: Invalid Telegram Bot Token. Please check your TELEGRAM_BOT_TOKEN in .env file";

pub const CHAT_NOT_FOUND_MESSAGE: &str = "Chat not found. Please check your Chat ID is correct. \
For usernames, make sure:\n\
1. The user has started a conversation with your bot (/start)\n\
2. The username is correct (e.g., @username)\n\
3. The user hasn't blocked your bot";

const USERNAME_TIP: &str =
    "Tip: Make sure the username starts with @ and the user has started a conversation with your bot";

/// Translate a non-200 response into a structured failure.
///
/// `chat not found` is matched case-sensitively, `username` is not.
pub fn translate_error(status: StatusCode, body: &[u8]) -> RelayResult {
    let envelope: ErrorEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(_) => {
            return RelayResult::failure(format!(
                "Telegram API error (HTTP {}): {}",
                status.as_u16(),
                String::from_utf8_lossy(body)
            ))
        }
    };

    let description = envelope.description;
    let message = match envelope.error_code {
        401 => UNAUTHORIZED_MESSAGE.to_string(),
        400 if description.contains("chat not found") => CHAT_NOT_FOUND_MESSAGE.to_string(),
        400 if description.to_lowercase().contains("username") => {
            format!("Username error: {}\n\n{}", description, USERNAME_TIP)
        }
        400 => format!("Bad Request: {}", description),
        _ => description,
    };

    RelayResult::failure(message)
}

/// Translate a 200 response body.
///
/// A body that is not a `sendDocument` envelope is an unexpected upstream
/// condition and is returned as an error rather than a failure.
pub fn translate_success(body: &[u8]) -> Result<RelayResult, TelegramError> {
    let envelope: SendDocumentEnvelope = serde_json::from_slice(body)
        .map_err(|e| TelegramError::ResponseError(format!("failed to parse response: {}", e)))?;

    if !envelope.ok {
        return Ok(RelayResult::failure(envelope.description));
    }

    Ok(RelayResult::Success {
        message_id: envelope.result.message_id,
        file_id: envelope.result.document.file_id,
    })
}
