use crate::api_error::ApiError;
use crate::config;
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use lazy_static::lazy_static;
use r2d2;

type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

embed_migrations!();

lazy_static! {
    static ref POOL: Pool = {
        let manager = ConnectionManager::<PgConnection>::new(config::database_url());
        Pool::builder().build_unchecked(manager)
    };
}

pub fn init() -> Result<(), ApiError> {
    info!("Initializing DB");
    lazy_static::initialize(&POOL);

    let conn = connection()?;
    run_migrations(&conn)
}

pub fn run_migrations(conn: &PgConnection) -> Result<(), ApiError> {
    embedded_migrations::run(conn)
        .map_err(|e| ApiError::new(500, format!("Applying database migrations failed: {}", e)))?;
    info!("Database schema is up to date");

    Ok(())
}

pub fn connection() -> Result<DbConnection, ApiError> {
    POOL.get()
        .map_err(|e| ApiError::new(500, format!("Failed getting db connection: {}", e)))
}

/// A connection inside a test transaction that is rolled back on drop. `None` when
/// `DATABASE_URL` is unset, so database tests skip on machines without postgres.
#[cfg(test)]
pub fn test_connection() -> Option<PgConnection> {
    use diesel::Connection;
    use std::sync::Once;

    static MIGRATE: Once = Once::new();

    let url = std::env::var("DATABASE_URL").ok()?;
    let conn = PgConnection::establish(&url).expect("connect to DATABASE_URL");
    MIGRATE.call_once(|| run_migrations(&conn).expect("apply migrations"));
    conn.begin_test_transaction().expect("begin test transaction");

    Some(conn)
}
