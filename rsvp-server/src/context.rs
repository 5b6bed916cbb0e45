use std::sync::Arc;

use axum::extract::FromRef;
use rsvp_collab::Collab;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
}

impl ServerContext {
    pub fn new(collab: Collab) -> Self {
        Self {
            collab: Arc::new(collab),
        }
    }
}
