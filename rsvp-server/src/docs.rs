use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{admin, auth, emails, rsvps, schemas, serialized};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::sign_in_anonymously,
        auth::logout,
        auth::user,
        rsvps::submit_rsvp,
        rsvps::my_rsvp,
        rsvps::list_rsvps,
        emails::send_broadcast,
        emails::dead_letters,
        admin::create_admin_profile,
        admin::check_password,
        admin::is_admin,
    ),
    components(schemas(
        schemas::LoginSchema,
        schemas::RegisterSchema,
        schemas::RsvpSchema,
        schemas::BroadcastSchema,
        schemas::AdminPasswordSchema,
        serialized::User,
        serialized::LoginResult,
        serialized::Rsvp,
        serialized::RsvpId,
        serialized::BroadcastResult,
        serialized::DeadLetter,
    )),
    modifiers(&Security),
    info(
        description = "rsvp-server exposes endpoints to RSVP to the event and to manage guests"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
