use std::sync::Arc;

use crate::{config::Config, sql::DB};

/// Everything a handler may touch; rows are never cached here, the store owns them.
#[derive(Debug)]
pub struct ServerState {
	pub db: DB,
	pub config: Config,
}

pub type SharedState = Arc<ServerState>;

pub fn new_shared_state(db: DB, config: Config) -> SharedState {
	Arc::new(ServerState { db, config })
}
