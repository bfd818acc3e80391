//! Connection and transaction lifecycle.
//!
//! A [`TransactionContext`] owns the one connection a query source may hold
//! and tracks whether a transaction is open. The state machine has exactly
//! two states:
//!
//! ```text
//! Idle  --begin-->  Active(connection)
//! Active --commit/rollback--> Idle
//! ```
//!
//! so "at most one active connection" holds by construction rather than by
//! call discipline over a nullable field.
//!
//! All transaction control takes `&mut self`: exclusive access is
//! compile-time-checked, and sharing a query source across threads requires
//! an external lock. This is the single locking policy for every query
//! type.

use sqlbind_core::error::TransactionErrorKind;
use sqlbind_core::{Connection, ConnectionPool, Error, Result};
use std::mem;
use std::sync::Arc;

enum TxState<C> {
    Idle,
    Active(C),
}

/// Owns the connection/transaction lifecycle for a single query source.
pub struct TransactionContext<P: ConnectionPool> {
    pool: Arc<P>,
    state: TxState<P::Conn>,
}

impl<P: ConnectionPool> TransactionContext<P> {
    /// Create an idle context over the given pool.
    pub fn new(pool: Arc<P>) -> Self {
        Self {
            pool,
            state: TxState::Idle,
        }
    }

    /// The pool this context reserves from.
    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    /// Is a transaction open?
    pub fn is_active(&self) -> bool {
        matches!(self.state, TxState::Active(_))
    }

    /// Open a transaction: reserve a connection, disable its auto-commit
    /// and hold it until commit or rollback.
    ///
    /// Fails fast when a transaction is already open.
    pub fn begin(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(Error::transaction(
                TransactionErrorKind::AlreadyActive,
                "a transaction is already active",
            ));
        }
        let mut conn = self.pool.reserve()?;
        if let Err(e) = conn.set_auto_commit(false) {
            self.pool.release(conn);
            return Err(e);
        }
        self.state = TxState::Active(conn);
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// The connection is released back to the pool and the context returns
    /// to idle even when the commit itself fails; the commit's error is the
    /// one reported.
    pub fn commit(&mut self) -> Result<()> {
        let TxState::Active(mut conn) = mem::replace(&mut self.state, TxState::Idle) else {
            return Err(Error::transaction(
                TransactionErrorKind::NotActive,
                "no active transaction",
            ));
        };
        let result = if conn.auto_commit() {
            Ok(())
        } else {
            conn.commit()
        };
        self.pool.release(conn);
        result
    }

    /// Roll back the open transaction. Release semantics match
    /// [`commit`](Self::commit).
    pub fn rollback(&mut self) -> Result<()> {
        let TxState::Active(mut conn) = mem::replace(&mut self.state, TxState::Idle) else {
            return Err(Error::transaction(
                TransactionErrorKind::NotActive,
                "no active transaction",
            ));
        };
        let result = conn.rollback();
        self.pool.release(conn);
        result
    }

    /// Run `f` against a connection: the active one when a transaction is
    /// open, otherwise one transparently reserved from the pool and
    /// released afterwards regardless of the outcome.
    pub fn with_connection<T>(
        &mut self,
        f: impl FnOnce(&mut P::Conn) -> Result<T>,
    ) -> Result<T> {
        match &mut self.state {
            TxState::Active(conn) => f(conn),
            TxState::Idle => {
                let mut conn = self.pool.reserve()?;
                let result = f(&mut conn);
                self.pool.release(conn);
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbind_core::error::TransactionError;
    use sqlbind_core::{Row, TableMetadata, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal {
        reserved: usize,
        released: usize,
        commits: usize,
        rollbacks: usize,
    }

    struct ProbeConnection {
        journal: Arc<Mutex<Journal>>,
        auto_commit: bool,
        fail_commit: bool,
    }

    impl Connection for ProbeConnection {
        fn query(&mut self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<u64> {
            Ok(1)
        }

        fn execute_returning_keys(
            &mut self,
            _sql: &str,
            _params: &[Value],
            _key_columns: &[String],
        ) -> Result<(u64, Option<Row>)> {
            Ok((1, None))
        }

        fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
            self.auto_commit = enabled;
            Ok(())
        }

        fn auto_commit(&self) -> bool {
            self.auto_commit
        }

        fn commit(&mut self) -> Result<()> {
            self.journal.lock().unwrap().commits += 1;
            if self.fail_commit {
                return Err(Error::query("commit failed"));
            }
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.journal.lock().unwrap().rollbacks += 1;
            Ok(())
        }

        fn table_metadata(
            &mut self,
            _catalog: Option<&str>,
            _schema: Option<&str>,
            _table: &str,
        ) -> Result<Option<TableMetadata>> {
            Ok(None)
        }
    }

    struct ProbePool {
        journal: Arc<Mutex<Journal>>,
        fail_commit: bool,
    }

    impl ProbePool {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                journal: Arc::new(Mutex::new(Journal::default())),
                fail_commit: false,
            })
        }

        fn failing_commit() -> Arc<Self> {
            Arc::new(Self {
                journal: Arc::new(Mutex::new(Journal::default())),
                fail_commit: true,
            })
        }
    }

    impl ConnectionPool for ProbePool {
        type Conn = ProbeConnection;

        fn reserve(&self) -> Result<ProbeConnection> {
            self.journal.lock().unwrap().reserved += 1;
            Ok(ProbeConnection {
                journal: Arc::clone(&self.journal),
                auto_commit: true,
                fail_commit: self.fail_commit,
            })
        }

        fn release(&self, _conn: ProbeConnection) {
            self.journal.lock().unwrap().released += 1;
        }
    }

    #[test]
    fn test_begin_twice_fails() {
        let pool = ProbePool::new();
        let mut tx = TransactionContext::new(pool);
        tx.begin().unwrap();
        let err = tx.begin().unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction(TransactionError {
                kind: TransactionErrorKind::AlreadyActive,
                ..
            })
        ));
        // still usable after the failed begin
        tx.commit().unwrap();
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let pool = ProbePool::new();
        let mut tx = TransactionContext::new(pool);
        let err = tx.commit().unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                ..
            })
        ));
    }

    #[test]
    fn test_begin_commit_releases_once() {
        let pool = ProbePool::new();
        let journal = Arc::clone(&pool.journal);
        let mut tx = TransactionContext::new(pool);
        tx.begin().unwrap();
        assert!(tx.is_active());
        tx.commit().unwrap();
        assert!(!tx.is_active());
        let j = journal.lock().unwrap();
        assert_eq!(j.reserved, 1);
        assert_eq!(j.released, 1);
        assert_eq!(j.commits, 1);
    }

    #[test]
    fn test_rollback_releases_once() {
        let pool = ProbePool::new();
        let journal = Arc::clone(&pool.journal);
        let mut tx = TransactionContext::new(pool);
        tx.begin().unwrap();
        tx.rollback().unwrap();
        let j = journal.lock().unwrap();
        assert_eq!(j.reserved, 1);
        assert_eq!(j.released, 1);
        assert_eq!(j.rollbacks, 1);
    }

    #[test]
    fn test_failed_commit_still_releases_and_goes_idle() {
        let pool = ProbePool::failing_commit();
        let journal = Arc::clone(&pool.journal);
        let mut tx = TransactionContext::new(pool);
        tx.begin().unwrap();
        assert!(tx.commit().is_err());
        assert!(!tx.is_active());
        let j = journal.lock().unwrap();
        assert_eq!(j.released, 1);
    }

    #[test]
    fn test_with_connection_reserves_and_releases_when_idle() {
        let pool = ProbePool::new();
        let journal = Arc::clone(&pool.journal);
        let mut tx = TransactionContext::new(pool);
        tx.with_connection(|conn| conn.execute("UPDATE t SET a = 1", &[]))
            .unwrap();
        let j = journal.lock().unwrap();
        assert_eq!(j.reserved, 1);
        assert_eq!(j.released, 1);
    }

    #[test]
    fn test_with_connection_releases_on_error() {
        let pool = ProbePool::new();
        let journal = Arc::clone(&pool.journal);
        let mut tx = TransactionContext::new(pool);
        let result: Result<()> = tx.with_connection(|_conn| Err(Error::query("boom")));
        assert!(result.is_err());
        let j = journal.lock().unwrap();
        assert_eq!(j.released, 1);
    }

    #[test]
    fn test_with_connection_keeps_active_connection() {
        let pool = ProbePool::new();
        let journal = Arc::clone(&pool.journal);
        let mut tx = TransactionContext::new(pool);
        tx.begin().unwrap();
        tx.with_connection(|conn| conn.execute("UPDATE t SET a = 1", &[]))
            .unwrap();
        {
            let j = journal.lock().unwrap();
            // the transactional connection is retained, not released
            assert_eq!(j.reserved, 1);
            assert_eq!(j.released, 0);
        }
        tx.commit().unwrap();
        let j = journal.lock().unwrap();
        assert_eq!(j.released, 1);
    }
}
