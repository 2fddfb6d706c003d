#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

pub use diesel::prelude::*;

pub use diesel::sqlite::SqliteConnection;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub mod errors;
pub mod schema;
pub mod models;
pub mod corpus;
pub mod levels;
pub mod knowledge;
pub mod drill;
pub mod problem;
pub mod user;

pub use crate::errors::*;
pub use crate::models::*;

pub type ConnPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

// WAL keeps level rebuilds from blocking readers; the busy timeout makes
// concurrent writers queue up instead of failing at once.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 10000;
    PRAGMA foreign_keys = ON;";

#[derive(Debug, Clone, Copy)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self,
                  conn: &mut SqliteConnection)
                  -> ::std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(CONNECTION_PRAGMAS)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn db_connect(database_url: &str) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)
        .chain_err(|| format!("Error connecting to database {}!", database_url))?;
    conn.batch_execute(CONNECTION_PRAGMAS)
        .chain_err(|| "Couldn't set the connection pragmas.")?;
    Ok(conn)
}

pub fn db_pool(database_url: &str) -> Result<ConnPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .connection_customizer(Box::new(ConnectionPragmas))
        .build(manager)
        .chain_err(|| format!("Error creating a connection pool for {}!", database_url))
}

/// Runs pending migrations and reports whether levels have been generated yet,
/// so the caller can prompt for the initial rebuild.
pub fn check_db(conn: &mut SqliteConnection) -> Result<bool> {
    run_db_migrations(conn).chain_err(|| "Couldn't run the migrations.")?;
    levels::have_levels(conn)
}

fn run_db_migrations(conn: &mut SqliteConnection) -> Result<()> {
    let ran = conn.run_pending_migrations(MIGRATIONS)
                  .map_err(|e| Error::from(format!("Migrations failed: {}", e)))?;
    for migration in ran {
        info!("Ran migration {}", migration);
    }
    Ok(())
}
