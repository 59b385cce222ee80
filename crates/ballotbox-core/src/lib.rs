pub mod auth;
pub mod voting;

use ballotbox_db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub session_ttl_seconds: u64,
    pub registration_enabled: bool,
    /// Cap on the number of questions returned by the listing endpoint.
    pub listing_limit: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 30 * 24 * 60 * 60,
            registration_enabled: true,
            listing_limit: 100,
        }
    }
}
