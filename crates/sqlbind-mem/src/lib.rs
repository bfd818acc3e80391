//! In-memory SQL engine implementing the sqlbind connection contracts.
//!
//! The reference backend for tests and demos: declared tables, a compact
//! interpreter for the SQL the default generator emits, generated-key
//! reporting and snapshot transactions. Behaves like an embedded
//! in-memory database reached through the `Connection`/`ConnectionPool`
//! traits from `sqlbind-core`.

pub mod connection;
pub mod engine;
mod parser;

pub use connection::MemConnection;
pub use engine::{MemDatabase, TableSpec};

use sqlbind_core::Result;
use sqlbind_pool::{PoolConfig, SimplePool};
use std::sync::{Arc, Mutex};

/// A connection pool over a shared in-memory database.
pub fn mem_pool(
    db: Arc<Mutex<MemDatabase>>,
) -> SimplePool<MemConnection, impl Fn() -> Result<MemConnection>> {
    mem_pool_with_config(db, PoolConfig::default())
}

/// A connection pool over a shared in-memory database with an explicit
/// configuration.
pub fn mem_pool_with_config(
    db: Arc<Mutex<MemDatabase>>,
    config: PoolConfig,
) -> SimplePool<MemConnection, impl Fn() -> Result<MemConnection>> {
    SimplePool::with_config(move || Ok(MemConnection::new(Arc::clone(&db))), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbind_core::ConnectionPool;

    #[test]
    fn test_mem_pool_reserves_connections() {
        let db = Arc::new(Mutex::new(MemDatabase::new()));
        let pool = mem_pool(db);
        let conn = pool.reserve().unwrap();
        pool.release(conn);
        assert_eq!(pool.stats().idle_connections, 1);
    }
}
