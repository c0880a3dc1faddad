/// Store client seam: the request/response types the engine sends to a
/// DynamoDB-like store and the trait a transport implements.
use async_trait::async_trait;
use dynaq_core::{Error, Item, Operation, RequestPlan, ReturnValues, Segment, WriteRequest};
use dynaq_core::{AttributeValue, Consistency};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// One store call, in the store's own vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    pub table: String,
    pub operation: Operation,
    pub filter_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: BTreeMap<String, String>,
    pub expression_attribute_values: BTreeMap<String, AttributeValue>,
    pub index_name: Option<String>,
    pub consistent_read: bool,
    pub limit: Option<u32>,
    pub exclusive_start_key: Option<Item>,
    pub scan_index_forward: bool,
    pub segment: Option<Segment>,
    pub return_values: ReturnValues,
}

impl StoreRequest {
    /// Translate a plan. The page cursor becomes the exclusive start key.
    pub fn from_plan(plan: &RequestPlan) -> Self {
        Self {
            table: plan.table.clone(),
            operation: plan.operation.clone(),
            filter_expression: plan.filter.clone(),
            condition_expression: plan.condition.clone(),
            projection_expression: plan.projection.clone(),
            expression_attribute_names: plan.names.clone(),
            expression_attribute_values: plan.values.clone(),
            index_name: plan.index.clone(),
            consistent_read: plan.consistency == Consistency::Strong,
            limit: plan.limit,
            exclusive_start_key: plan.cursor.as_ref().map(|c| c.key.clone()),
            scan_index_forward: plan.forward,
            segment: plan.segment,
            return_values: plan.return_values,
        }
    }

    /// Store action name, e.g. `Query` or `BatchWriteItem`
    pub fn action(&self) -> &'static str {
        match self.operation {
            Operation::Get { .. } => "GetItem",
            Operation::Query { .. } => "Query",
            Operation::Scan => "Scan",
            Operation::Put { .. } => "PutItem",
            Operation::Update { .. } => "UpdateItem",
            Operation::Delete { .. } => "DeleteItem",
            Operation::BatchGet { .. } => "BatchGetItem",
            Operation::BatchWrite { .. } => "BatchWriteItem",
            Operation::TransactWrite { .. } => "TransactWriteItems",
        }
    }
}

/// What the store sent back. Fields not used by an action stay empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreResponse {
    /// GetItem result
    pub item: Option<Item>,
    /// Query, Scan and BatchGetItem results
    pub items: Vec<Item>,
    /// Set when more pages remain
    pub last_evaluated_key: Option<Item>,
    /// Write return values
    pub attributes: Option<Item>,
    pub unprocessed_keys: Vec<Item>,
    pub unprocessed_writes: Vec<WriteRequest>,
}

impl StoreResponse {
    pub fn with_item(item: Option<Item>) -> Self {
        Self {
            item,
            ..Default::default()
        }
    }

    pub fn with_items(items: Vec<Item>, last_evaluated_key: Option<Item>) -> Self {
        Self {
            items,
            last_evaluated_key,
            ..Default::default()
        }
    }
}

/// Failure reported by the store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Throttled: {0}")]
    Throttling(String),

    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    /// Cancellation reason per write, `None` for writes that were not the cause
    #[error("Transaction canceled: {0:?}")]
    TransactionCanceled(Vec<Option<String>>),

    #[error("Service error: {0}")]
    Service(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Throttling(msg) => Error::Throttled(msg),
            StoreError::ConditionalCheckFailed(msg) => Error::ConditionalCheckFailed(msg),
            StoreError::TransactionCanceled(reasons) => Error::TransactionCanceled(reasons),
            StoreError::Service(msg) => Error::Service(msg),
        }
    }
}

/// Transport to the store. One call per request; retries are the engine's job.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError>;
}

#[async_trait]
impl<C: StoreClient + ?Sized> StoreClient for Arc<C> {
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<C: StoreClient + ?Sized> StoreClient for &C {
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        (**self).send(request).await
    }
}
