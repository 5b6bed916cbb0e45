use axum::{
    extract::State,
    routing::{get, post},
    Json,
};

use crate::{
    auth::Admin,
    context::ServerContext,
    errors::ServerResult,
    schemas::{BroadcastSchema, ValidatedJson},
    serialized::{BroadcastResult, DeadLetter, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/emails",
    tag = "emails",
    request_body = BroadcastSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BroadcastResult, description = "The email was queued for delivery"),
        (status = 400, description = "No recipients found"),
        (status = 403, description = "Admin rights are required")
    )
)]
async fn send_broadcast(
    Admin(session): Admin,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<BroadcastSchema>,
) -> ServerResult<Json<BroadcastResult>> {
    log::info!(
        "User {} is broadcasting \"{}\"",
        session.user.id,
        body.subject
    );

    let receipt = context.collab.mailer.send_broadcast(body.into()).await?;

    Ok(Json(receipt.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/emails/dead-letters",
    tag = "emails",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<DeadLetter>, description = "Emails that could not be delivered"),
        (status = 403, description = "Admin rights are required")
    )
)]
async fn dead_letters(
    _admin: Admin,
    State(context): State<ServerContext>,
) -> Json<Vec<DeadLetter>> {
    Json(context.collab.mailer.dead_letters().to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(send_broadcast))
        .route("/dead-letters", get(dead_letters))
}
