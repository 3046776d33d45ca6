use crate::auth::AuthError;
use crate::storage::StorageError;
use crate::transport::TransportError;
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("network_error:{message}")]
    Network { message: String },
    #[error("ticketdesk_http_{status}:{body}")]
    Http { status: u16, body: String },
    #[error("ticketdesk_json_decode_failed:{message}")]
    Decode { message: String },
    #[error("ticketdesk_json_encode_failed:{message}")]
    Encode { message: String },
    #[error("validation_failed:{0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid_request:{message}")]
    InvalidRequest { message: String },
}

impl ClientError {
    #[must_use]
    pub fn from_http_status(status: u16, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).trim().to_string();
        let body = if body.is_empty() {
            "<empty>".to_string()
        } else {
            body
        };
        Self::Http { status, body }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Auth(AuthError::SessionExpired))
    }

    /// Text a view can show to the user for this failure.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(AuthError::InvalidCredentials) => "Invalid email or password.".to_string(),
            Self::Auth(AuthError::SessionExpired) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            Self::Network { .. } => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::Http { status: 403, .. } => {
                "You do not have permission to perform this action.".to_string()
            }
            Self::Http { status: 404, .. } => "The requested item was not found.".to_string(),
            Self::Http { status, body } => format!("Request failed ({status}): {body}"),
            Self::Validation(errors) => errors.to_string(),
            Self::Decode { .. } | Self::Encode { .. } => {
                "The server returned an unexpected response.".to_string()
            }
            Self::Storage(error) => format!("Local session storage failed: {error}"),
            Self::InvalidRequest { message } => message.clone(),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Network { message } => Self::Network { message },
            TransportError::InvalidRequest { message } => Self::InvalidRequest { message },
        }
    }
}

impl From<ValidationErrors> for ClientError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
