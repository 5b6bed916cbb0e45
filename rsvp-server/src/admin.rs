use axum::{
    extract::State,
    routing::{get, post},
    Json,
};

use crate::{
    auth::MaybeSession,
    context::ServerContext,
    errors::ServerResult,
    schemas::{AdminPasswordSchema, ValidatedJson},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/admin/profile",
    tag = "admin",
    request_body = AdminPasswordSchema,
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Option<i32>, description = "The admin profile id, or null if the password is wrong or nobody is logged in")
    )
)]
async fn create_admin_profile(
    session: MaybeSession,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<AdminPasswordSchema>,
) -> ServerResult<Json<Option<i32>>> {
    let profile = context
        .collab
        .admin
        .create_admin_profile(session.user(), &body.admin_password)
        .await?;

    Ok(Json(profile))
}

#[utoipa::path(
    post,
    path = "/v1/admin/check-password",
    tag = "admin",
    request_body = AdminPasswordSchema,
    responses(
        (status = 200, body = bool)
    )
)]
async fn check_password(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<AdminPasswordSchema>,
) -> Json<bool> {
    Json(context.collab.admin.check_password(&body.admin_password))
}

#[utoipa::path(
    get,
    path = "/v1/admin/is-admin",
    tag = "admin",
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = bool)
    )
)]
async fn is_admin(
    session: MaybeSession,
    State(context): State<ServerContext>,
) -> ServerResult<Json<bool>> {
    let is_admin = context.collab.admin.is_admin(session.user()).await?;

    Ok(Json(is_admin))
}

pub fn router() -> Router {
    Router::new()
        .route("/profile", post(create_admin_profile))
        .route("/check-password", post(check_password))
        .route("/is-admin", get(is_admin))
}
