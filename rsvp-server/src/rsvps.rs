use axum::{
    extract::State,
    routing::{get, post},
    Json,
};

use crate::{
    auth::{Admin, MaybeSession, Session},
    context::ServerContext,
    errors::ServerResult,
    schemas::{RsvpSchema, ValidatedJson},
    serialized::{Rsvp, RsvpId, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/rsvps",
    tag = "rsvps",
    request_body = RsvpSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RsvpId, description = "The RSVP was created or replaced"),
        (status = 400, description = "The submission is invalid"),
        (status = 401, description = "User not authenticated")
    )
)]
async fn submit_rsvp(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RsvpSchema>,
) -> ServerResult<Json<RsvpId>> {
    let id = context
        .collab
        .rsvps
        .submit(Some(&session.0.user), body.into_submission())
        .await?;

    Ok(Json(RsvpId { id }))
}

#[utoipa::path(
    get,
    path = "/v1/rsvps/me",
    tag = "rsvps",
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Option<Rsvp>, description = "The caller's RSVP, or null")
    )
)]
async fn my_rsvp(
    session: MaybeSession,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Option<Rsvp>>> {
    let rsvp = context.collab.rsvps.my_rsvp(session.user()).await?;

    Ok(Json(rsvp.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rsvps",
    tag = "rsvps",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Rsvp>),
        (status = 403, description = "Admin rights are required")
    )
)]
async fn list_rsvps(
    _admin: Admin,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Rsvp>>> {
    let rsvps = context.collab.rsvps.list_all().await?;

    Ok(Json(rsvps.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rsvps))
        .route("/", post(submit_rsvp))
        .route("/me", get(my_rsvp))
}
