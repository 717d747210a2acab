//! Store boundary traits
//!
//! The sink is driver-agnostic: everything it needs from the columnar store
//! is a connection that can be probed, can run DDL, and can open a
//! transactional unit that accepts prepared positional rows. A concrete
//! driver binding implements these three traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schema::Row;

/// Connection factory for the columnar store
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a live connection
    async fn connect(&self) -> Result<Arc<dyn StoreConnection>, StoreError>;
}

/// A live store connection
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Liveness probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Execute a standalone statement (DDL)
    async fn execute(&self, statement: &str) -> Result<(), StoreError>;

    /// Open a transactional unit
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Close the connection
    async fn close(&self) -> Result<(), StoreError>;
}

/// One transactional unit against the store
///
/// `commit` and `rollback` consume the transaction; exactly one of them
/// concludes it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Prepare the positional insert statement for this transaction
    async fn prepare(&mut self, statement: &str) -> Result<(), StoreError>;

    /// Execute the prepared statement for one row
    async fn execute_row(&mut self, row: &Row) -> Result<(), StoreError>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Roll the transaction back, discarding all writes
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
