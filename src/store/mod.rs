//! Document storage backends

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{DeleteAck, InsertAck, Target, UpdateAck};

/// A document database the gateway forwards operations to.
///
/// Implementations are shared by every in-flight request and must be safe
/// for concurrent use. Deadlines are enforced by the caller: a call whose
/// future is dropped must release whatever it holds (cursors, sessions).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and health output
    fn kind(&self) -> &'static str;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<()>;

    /// Insert a single document
    async fn insert_one(&self, target: &Target, document: Value) -> Result<InsertAck>;

    /// Return every document matching `filter`, fully materialized
    async fn find(&self, target: &Target, filter: Value) -> Result<Vec<Value>>;

    /// Apply `$set` of `fields` to every document matching `filter`
    async fn update_many(&self, target: &Target, filter: Value, fields: Value) -> Result<UpdateAck>;

    /// Remove every document matching `filter`
    async fn delete_many(&self, target: &Target, filter: Value) -> Result<DeleteAck>;
}
