mod admin;
mod auth;
mod config;
mod db;
mod mailer;
mod recipients;
mod rsvps;
mod util;

use std::sync::Arc;

pub use admin::*;
pub use auth::*;
pub use config::*;
pub use db::*;
pub use mailer::*;
pub use recipients::*;
pub use rsvps::*;

use log::info;

/// The RSVP system, facilitating authentication, RSVPs, admin rights and broadcasts.
pub struct Collab {
    pub database: Arc<dyn Database>,

    pub auth: Auth,
    pub rsvps: RsvpManager,
    pub admin: AdminBootstrap,
    pub mailer: Mailer,
}

impl Collab {
    /// Creates the system, picking the mail transport from the config.
    /// Must be called from within a tokio runtime.
    pub fn new(config: &Config, database: BoxedDatabase) -> Self {
        let transport: BoxedTransport = match &config.mail.api_key {
            Some(api_key) => Arc::new(ResendTransport::new(&config.mail, api_key.clone())),
            None => {
                info!("No mail API key is configured, broadcasts will only be logged");
                Arc::new(LogTransport)
            }
        };

        Self::with_transport(config, database, transport)
    }

    pub fn with_transport(
        config: &Config,
        database: BoxedDatabase,
        transport: BoxedTransport,
    ) -> Self {
        let database: Arc<dyn Database> = Arc::from(database);

        Self {
            auth: Auth::new(&database),
            rsvps: RsvpManager::new(&database),
            admin: AdminBootstrap::new(&database, config.admin_password.clone()),
            mailer: Mailer::new(&database, &config.mail, transport),
            database,
        }
    }
}
