use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::tokens::TokenService;
use crate::config::Config;
use crate::votes::{DynVoteLedger, SqliteVoteLedger};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenService>,
    pub votes: DynVoteLedger,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let tokens = Arc::new(TokenService::new(config.auth.token_config()));
        let votes: DynVoteLedger = Arc::new(SqliteVoteLedger::new(db.clone()));
        Self {
            db,
            config,
            tokens,
            votes,
        }
    }
}
