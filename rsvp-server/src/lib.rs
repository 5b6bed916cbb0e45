mod admin;
mod auth;
mod context;
mod docs;
mod emails;
mod errors;
mod rsvps;
mod schemas;
mod serialized;

use axum::routing::get;
use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    num::ParseIntError,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use errors::{ServerError, ServerResult};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// Environment variable overriding [DEFAULT_PORT]
pub const PORT_ENV: &str = "RSVP_SERVER_PORT";

pub type Router = axum::Router<ServerContext>;

/// Reads the port from the environment, falling back to [DEFAULT_PORT]
pub fn port_from_env() -> Result<u16, ParseIntError> {
    match env::var(PORT_ENV) {
        Ok(port) => port.trim().parse(),
        Err(_) => Ok(DEFAULT_PORT),
    }
}

/// Builds the full application router with all versioned endpoints
pub fn router(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/rsvps", rsvps::router())
        .nest("/emails", emails::router())
        .nest("/admin", admin::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the RSVP server
pub async fn run_server(context: ServerContext, port: u16) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    log::info!("Listening on {}", addr);

    axum::serve(listener, router(context)).await
}
