//! The query delegate contract.
//!
//! A query delegate is the row-level CRUD + transaction protocol a
//! higher-level container consumes. [`TableQuery`](crate::TableQuery) and
//! [`FreeformQuery`](crate::FreeformQuery) both implement it.
//!
//! Transaction control takes `&mut self` on every delegate: exclusive use
//! is compile-time-checked, and callers that share one delegate across
//! threads wrap it in a lock of their own.

use sqlbind_core::{Filter, OrderBy, Result, Row, RowId, RowItem, Value};

/// Row-level CRUD and transaction protocol over one logical query source.
pub trait QueryDelegate {
    /// Number of rows the source currently matches.
    fn count(&mut self) -> Result<u64>;

    /// Fetch a window of rows. A `page_length` of zero means "everything
    /// from `offset` on". Whether the window is applied server-side is
    /// reported by
    /// [`respects_paging_limits`](Self::respects_paging_limits).
    fn results(&mut self, offset: usize, page_length: usize) -> Result<Vec<Row>>;

    /// Does `results` apply offset/page-length server-side? When `false`
    /// the caller must clip the returned rows itself.
    fn respects_paging_limits(&self) -> bool;

    /// Replace the filter set. An empty vector clears it.
    fn set_filters(&mut self, filters: Vec<Filter>) -> Result<()>;

    /// Replace the ordering. An empty vector restores the default order.
    fn set_order_by(&mut self, order_bys: Vec<OrderBy>) -> Result<()>;

    /// Insert (temporary row id) or update (final row id) the given row.
    /// Returns the number of affected rows.
    fn store_row(&mut self, row: &mut RowItem) -> Result<u64>;

    /// Delete the given row. Returns `false` when the row was not found.
    fn remove_row(&mut self, row: &RowItem) -> Result<bool>;

    /// Open a transaction. Fails when one is already active.
    fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<()>;

    /// The primary-key column names, in key order.
    fn primary_key_columns(&self) -> &[String];

    /// Does any row match the given primary-key values (in addition to the
    /// current filters)?
    fn contains_row_with_key(&mut self, keys: &[Value]) -> Result<bool>;
}

/// Pairs a row's pre-insert temporary id with the final id derived from
/// the database's generated keys.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIdChangeEvent {
    old_id: RowId,
    new_id: RowId,
}

impl RowIdChangeEvent {
    pub fn new(old_id: RowId, new_id: RowId) -> Self {
        Self { old_id, new_id }
    }

    /// The temporary id the row carried before the insert.
    pub fn old_id(&self) -> &RowId {
        &self.old_id
    }

    /// The final id assigned by the database.
    pub fn new_id(&self) -> &RowId {
        &self.new_id
    }
}

/// Handle for removing a registered row-id change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Implemented by delegates that report row-id changes.
///
/// Events are buffered while a transaction is open and delivered once per
/// successful commit; a rollback discards them.
pub trait RowIdChangeNotifier {
    /// Register a listener; returns a handle for removal.
    fn add_row_id_change_listener(
        &mut self,
        listener: Box<dyn FnMut(&RowIdChangeEvent) + Send>,
    ) -> ListenerId;

    /// Remove a previously registered listener.
    fn remove_row_id_change_listener(&mut self, id: ListenerId);
}
