use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    routing::{get, post},
    Json,
};
use rsvp_collab::{AuthError, Credentials, SessionData, UserData};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{LoginSchema, RegisterSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(pub SessionData);

/// A session that may or may not exist, for endpoints that also serve anonymous callers
pub struct MaybeSession(pub Option<SessionData>);

/// A session belonging to a user with an admin profile
pub struct Admin(pub SessionData);

impl MaybeSession {
    pub fn user(&self) -> Option<&UserData> {
        self.0.as_ref().map(|s| &s.user)
    }
}

fn bearer_token(parts: &Parts) -> ServerResult<Option<&str>> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ServerError::BadRequest("Authorization must be Bearer".to_string()))?;

    let segments: Vec<_> = value.split_ascii_whitespace().collect();

    match segments.as_slice() {
        ["Bearer", token] => Ok(Some(*token)),
        _ => Err(ServerError::BadRequest(
            "Authorization must be Bearer".to_string(),
        )),
    }
}

/// An unknown or expired session counts as no session, other failures are passed on
fn optional_session(
    result: Result<SessionData, AuthError>,
) -> ServerResult<Option<SessionData>> {
    match result {
        Ok(session) => Ok(Some(session)),
        Err(AuthError::InvalidSession) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(ServerError::Unauthorized("Missing authorization"))?;
        let session = context.collab.auth.session(token).await?;

        Ok(Self(session))
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for MaybeSession {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let session = match bearer_token(parts) {
            Ok(Some(token)) => optional_session(context.collab.auth.session(token).await)?,
            _ => None,
        };

        Ok(Self(session))
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Admin {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let Session(session) = Session::from_request_parts(parts, context).await?;

        if !context.collab.admin.is_admin(Some(&session.user)).await? {
            return Err(ServerError::Forbidden);
        }

        Ok(Self(session))
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = User),
        (status = 409, description = "A user with this email already exists")
    )
)]
async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .collab
        .auth
        .register(Credentials {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult),
        (status = 400, description = "Invalid credentials")
    )
)]
async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .collab
        .auth
        .login(Credentials {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/anonymous",
    tag = "auth",
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn sign_in_anonymously(
    State(context): State<ServerContext>,
) -> ServerResult<Json<LoginResult>> {
    let session = context.collab.auth.sign_in_anonymously().await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The session was deleted")
    )
)]
async fn logout(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    context.collab.auth.logout(&session.0.token).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Option<User>, description = "The logged in user, or null")
    )
)]
async fn user(session: MaybeSession) -> Json<Option<User>> {
    Json(session.user().map(|u| u.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/anonymous", post(sign_in_anonymously))
        .route("/logout", post(logout))
        .route("/user", get(user))
}
