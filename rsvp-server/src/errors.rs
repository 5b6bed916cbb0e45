use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rsvp_collab::{AuthError, DatabaseError, MailError, RecipientError, RsvpError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Admin rights are required")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("No recipients found")]
    NoRecipients,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::InvalidCredentials | Self::NoRecipients => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Self::Unknown(message) = &self {
            log::error!("Request failed: {}", message);
        }

        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::InvalidSession => Self::Unauthorized("Session does not exist"),
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<RsvpError> for ServerError {
    fn from(value: RsvpError) -> Self {
        match value {
            RsvpError::NotAuthenticated => Self::Unauthorized("User not authenticated"),
            e @ RsvpError::MissingPlusOne => Self::BadRequest(e.to_string()),
            RsvpError::Db(e) => e.into(),
        }
    }
}

impl From<MailError> for ServerError {
    fn from(value: MailError) -> Self {
        match value {
            MailError::Recipients(RecipientError::NoRecipients) => Self::NoRecipients,
            MailError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServerError::from(RsvpError::NotAuthenticated), 401),
            (ServerError::Forbidden, 403),
            (ServerError::from(RsvpError::MissingPlusOne), 400),
            (ServerError::from(AuthError::InvalidCredentials), 400),
            (
                ServerError::from(MailError::Recipients(RecipientError::NoRecipients)),
                400,
            ),
            (
                ServerError::from(DatabaseError::Conflict {
                    resource: "user",
                    field: "email",
                    value: "a@example.com".to_string(),
                }),
                409,
            ),
            (ServerError::from(MailError::QueueClosed), 500),
        ];

        for (error, status) in cases {
            assert_eq!(error.as_status_code().as_u16(), status, "{error}");
        }
    }

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(
            ServerError::from(MailError::Recipients(RecipientError::NoRecipients)).to_string(),
            "No recipients found"
        );
        assert_eq!(
            ServerError::from(RsvpError::NotAuthenticated).to_string(),
            "User not authenticated"
        );
    }
}
