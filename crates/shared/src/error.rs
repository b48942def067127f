use serde::{Deserialize, Serialize};

/// Error body returned by the back-office service.
///
/// The service answers failures with a JSON document that usually carries a
/// human readable `message`; `error` holds the HTTP reason phrase when the
/// framework generated the body itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    /// The server-provided message, falling back to the reason phrase.
    pub fn best_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.error.as_deref().filter(|e| !e.trim().is_empty()))
    }
}
