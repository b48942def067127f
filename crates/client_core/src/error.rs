use thiserror::Error;

/// Failure of a call made through the request gateway.
///
/// `AuthExpired` is the distinguished 401/403 case. The gateway never clears
/// the session on its own; callers decide whether to force a sign-out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("authorization rejected ({status}): {message}")]
    AuthExpired { status: u16, message: String },
    #[error("request failed{}: {message}", status_suffix(.status))]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl RequestError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status, absent when the request never produced a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired { status, .. } => Some(*status),
            Self::RequestFailed { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::AuthExpired { message, .. } | Self::RequestFailed { message, .. } => message,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}
