//! Connection pooling for sqlbind.
//!
//! This crate provides a synchronous connection pool over a connection
//! factory. The query layer only relies on the `ConnectionPool` contract
//! from `sqlbind-core`; this implementation adds capacity limits and
//! statistics.

use sqlbind_core::error::{PoolError, PoolErrorKind};
use sqlbind_core::{Connection, ConnectionPool, Error, Result};
use std::sync::Mutex;

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Minimum number of connections to keep idle
    pub min_connections: usize,
    /// Maximum number of connections allowed
    pub max_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given max connections.
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            ..Default::default()
        }
    }

    /// Set minimum idle connections.
    pub fn min_connections(mut self, n: usize) -> Self {
        self.min_connections = n;
        self
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of connections (active + idle)
    pub total_connections: usize,
    /// Number of idle connections
    pub idle_connections: usize,
    /// Number of connections currently reserved
    pub active_connections: usize,
}

struct PoolInner<C> {
    idle: Vec<C>,
    total: usize,
}

/// A synchronous connection pool over a connection factory.
///
/// Reserving pops an idle connection or creates a new one while below
/// capacity; at capacity, reserving fails with a pool-exhausted error.
/// Released connections have auto-commit restored before they are handed
/// out again; a connection that cannot be reset is dropped rather than
/// reused.
pub struct SimplePool<C, F> {
    factory: F,
    config: PoolConfig,
    inner: Mutex<PoolInner<C>>,
}

impl<C, F> SimplePool<C, F>
where
    C: Connection,
    F: Fn() -> Result<C>,
{
    /// Create a pool with the default configuration.
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, PoolConfig::default())
    }

    /// Create a pool with the given configuration.
    pub fn with_config(factory: F, config: PoolConfig) -> Self {
        Self {
            factory,
            config,
            inner: Mutex::new(PoolInner {
                idle: Vec::new(),
                total: 0,
            }),
        }
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get the current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().expect("pool lock poisoned");
        PoolStats {
            total_connections: inner.total,
            idle_connections: inner.idle.len(),
            active_connections: inner.total - inner.idle.len(),
        }
    }

    /// Check if the pool is at capacity.
    pub fn at_capacity(&self) -> bool {
        let inner = self.inner.lock().expect("pool lock poisoned");
        inner.total >= self.config.max_connections && inner.idle.is_empty()
    }
}

impl<C, F> ConnectionPool for SimplePool<C, F>
where
    C: Connection + Send,
    F: Fn() -> Result<C> + Send + Sync,
{
    type Conn = C;

    fn reserve(&self) -> Result<C> {
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        if let Some(conn) = inner.idle.pop() {
            return Ok(conn);
        }
        if inner.total >= self.config.max_connections {
            return Err(Error::Pool(PoolError {
                kind: PoolErrorKind::Exhausted,
                message: format!(
                    "all {} connections are reserved",
                    self.config.max_connections
                ),
            }));
        }
        // Count the slot before building so a failing factory does not
        // leak capacity.
        inner.total += 1;
        drop(inner);
        match (self.factory)() {
            Ok(conn) => Ok(conn),
            Err(e) => {
                let mut inner = self.inner.lock().expect("pool lock poisoned");
                inner.total -= 1;
                Err(Error::Pool(PoolError {
                    kind: PoolErrorKind::Factory,
                    message: format!("connection factory failed: {e}"),
                }))
            }
        }
    }

    fn release(&self, mut conn: C) {
        // Hand connections out in a clean state
        if let Err(e) = conn.set_auto_commit(true) {
            tracing::warn!(error = %e, "dropping connection that failed auto-commit reset");
            let mut inner = self.inner.lock().expect("pool lock poisoned");
            inner.total -= 1;
            return;
        }
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        inner.idle.push(conn);
    }
}
