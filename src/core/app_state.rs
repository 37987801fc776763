use crate::chat::ChatHub;

use super::db::PgPool;

/// Shared state handed to every handler. Cloning is cheap; both members are
/// reference-counted internally.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub chat: ChatHub,
}

impl AppState {
    pub fn new(db_pool: PgPool) -> Self {
        Self {
            db_pool,
            chat: ChatHub::default(),
        }
    }
}
