mod from_row;
mod schema;
pub mod queries;

pub use from_row::FromRow;
pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::PayPalClient;
use crate::session::SessionVerifier;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Public origin of the site (e.g., https://fund.hempin.org)
    pub site_url: String,
    /// Identity provider login page; `?next=` is appended.
    pub auth_login_url: String,
    pub default_campaign_slug: String,
    pub dev_mode: bool,
    pub sessions: Arc<SessionVerifier>,
    pub paypal: Arc<PayPalClient>,
}

fn connection_setup(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(connection_setup);
    Pool::builder().max_size(10).build(manager)
}

/// Single-connection in-memory pool. Each SQLite memory connection is its own
/// database, so the pool must never open a second one.
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::memory().with_init(connection_setup);
    Pool::builder().max_size(1).build(manager)
}
