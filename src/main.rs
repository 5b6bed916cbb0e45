use std::num::ParseIntError;

use colored::Colorize;
use log::{error, info};
use rsvp_collab::{
    BoxedDatabase, Collab, Config, ConfigError, DatabaseError, MemoryDatabase, PgDatabase,
};
use rsvp_server::ServerContext;
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("RSVP_SERVER_PORT must be a port number: {0}")]
    Port(#[from] ParseIntError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped unexpectedly: {0}")]
    Server(#[from] std::io::Error),
}

impl StartupError {
    fn hint(&self) -> String {
        match self {
            StartupError::Config(_) => "Check the RSVP_MAIL_* environment variables and try again.".to_string(),
            StartupError::Port(_) => "Unset RSVP_SERVER_PORT to use the default port.".to_string(),
            StartupError::Database(_) => "This is a database error. Make sure DATABASE_URL points to a running postgres instance, then try again.".to_string(),
            StartupError::Server(_) => "Make sure the port is not already in use.".to_string(),
        }
    }
}

async fn connect(config: &Config) -> Result<BoxedDatabase, DatabaseError> {
    match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            Ok(Box::new(PgDatabase::new(url).await?))
        }
        None => {
            info!("No DATABASE_URL is set, data is kept in memory and lost on restart");
            Ok(Box::new(MemoryDatabase::new()))
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let port = rsvp_server::port_from_env()?;
    let database = connect(&config).await?;

    let collab = Collab::new(&config, database);
    info!("Initialized successfully.");

    rsvp_server::run_server(ServerContext::new(collab), port).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(error) = logging::init_logger(logging::verbose_from_env()) {
        eprintln!("Failed to initialize logging: {error}");
    }

    if let Err(error) = run().await {
        error!(
            "{} Read the error below to troubleshoot the issue.",
            "RSVP server failed to start!".bold().red()
        );
        error!("{}", error);
        error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
    }
}
