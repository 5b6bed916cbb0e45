use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use log::info;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::random_string, Database, DatabaseError, NewSession, NewUser, SessionData, UserData,
};

pub struct Auth {
    db: Arc<dyn Database>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The session doesn't exist or has expired
    #[error("Session does not exist")]
    InvalidSession,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: i64 = 7;

    pub fn new(db: &Arc<dyn Database>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Logs in a user with a password, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await?;

        let user = self
            .db
            .user_by_email(&credentials.email)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        // Anonymous users can't log in with a password
        let stored_password = user.password.as_deref().ok_or(AuthError::InvalidCredentials)?;
        let stored_password = PasswordHash::parse(stored_password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.start_session(&user).await
    }

    /// Creates a user without credentials, returning a session for it
    pub async fn sign_in_anonymously(&self) -> Result<SessionData, AuthError> {
        let user = self
            .db
            .create_user(NewUser {
                email: None,
                password: None,
            })
            .await
            .map_err(AuthError::Db)?;

        info!("Created anonymous user {}", user.id);
        self.start_session(&user).await
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Creates a user with an email and password
    pub async fn register(&self, credentials: Credentials) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(credentials.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let user = self
            .db
            .create_user(NewUser {
                email: Some(credentials.email),
                password: Some(hashed_password),
            })
            .await
            .map_err(AuthError::Db)?;

        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Returns a session if it exists and hasn't expired
    pub async fn session(&self, token: &str) -> Result<SessionData, AuthError> {
        let session = self.db.session_by_token(token).await.map_err(|e| match e {
            DatabaseError::NotFound { .. } => AuthError::InvalidSession,
            err => AuthError::Db(err),
        })?;

        if session.expires_at <= Utc::now() {
            return Err(AuthError::InvalidSession);
        }

        Ok(session)
    }

    async fn start_session(&self, user: &UserData) -> Result<SessionData, AuthError> {
        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        self.db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    async fn clear_expired(&self) -> Result<(), AuthError> {
        self.db
            .clear_expired_sessions()
            .await
            .map_err(AuthError::Db)
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}
