//! Operation dispatcher

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::TimeoutConfig;
use crate::error::{Error, Result};
use crate::store::DocumentStore;
use crate::types::{Operation, OperationRequest, OperationResult, Target};

/// Per-operation deadlines, measured from request start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub insert: Duration,
    pub find: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Budgets {
    pub fn uniform(budget: Duration) -> Self {
        Self {
            insert: budget,
            find: budget,
            update: budget,
            delete: budget,
        }
    }

    pub fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Insert => self.insert,
            Operation::Find => self.find,
            Operation::UpdateMany => self.update,
            Operation::DeleteMany => self.delete,
        }
    }
}

impl From<&TimeoutConfig> for Budgets {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            insert: timeouts.budget(Operation::Insert),
            find: timeouts.budget(Operation::Find),
            update: timeouts.budget(Operation::UpdateMany),
            delete: timeouts.budget(Operation::DeleteMany),
        }
    }
}

/// Runs one validated operation against one target through the injected store
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn DocumentStore>,
    budgets: Budgets,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, budgets: Budgets) -> Self {
        Self { store, budgets }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Execute `request` against `target`.
    ///
    /// The store call must finish before `started + budget`; otherwise its
    /// future is dropped and the request fails with [`Error::Timeout`].
    /// Each call has its own deadline, so a slow request never shortens
    /// another one's budget.
    pub async fn dispatch(
        &self,
        target: &Target,
        request: OperationRequest,
        started: Instant,
    ) -> Result<OperationResult> {
        let operation = request.operation();
        let budget = self.budgets.for_operation(operation);

        let call = async {
            match request {
                OperationRequest::Insert { data } => self
                    .store
                    .insert_one(target, data)
                    .await
                    .map(OperationResult::Inserted),
                OperationRequest::Find { query } => self
                    .store
                    .find(target, query)
                    .await
                    .map(OperationResult::Documents),
                OperationRequest::UpdateMany { query, data } => self
                    .store
                    .update_many(target, query, data)
                    .await
                    .map(OperationResult::Updated),
                OperationRequest::DeleteMany { query } => self
                    .store
                    .delete_many(target, query)
                    .await
                    .map(OperationResult::Deleted),
            }
        };

        // A budget too large to add to the start instant is effectively unbounded
        let outcome = match started.checked_add(budget) {
            Some(deadline) => tokio::time::timeout_at(deadline, call).await,
            None => tokio::time::timeout(budget, call).await,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: operation.as_str(),
                budget,
            }),
        };

        match &result {
            Ok(_) => tracing::debug!("{} on {} succeeded", operation, target),
            Err(e) => tracing::warn!("{} on {} failed: {}", operation, target, e),
        }

        result
    }
}
