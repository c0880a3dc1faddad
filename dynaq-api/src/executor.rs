//! Execution engine.
//!
//! Every store call made here goes through [`Executor::submit`], which walks
//! the call through `Built -> Submitted -> {Succeeded, Throttled, Failed}`.
//! Throttled calls go back to `Submitted` after an exponential, jittered
//! backoff until the retry policy runs out, at which point the operation
//! fails with `CapacityExceeded`. Conditional-check and service failures are
//! final on the first attempt.

use crate::client::{StoreClient, StoreError, StoreRequest, StoreResponse};
use crate::config::ExecutorConfig;
use crate::stream::{ItemStream, Page};
use dynaq_core::{Document, Error, Item, Operation, PageCursor, RequestPlan, Result, Shape, WriteRequest};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of a put, update or delete.
///
/// A failed condition is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written { attributes: Option<Item> },
    ConditionFailed(String),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written { .. })
    }

    /// Item image requested through `return_values`
    pub fn attributes(&self) -> Option<&Item> {
        match self {
            WriteOutcome::Written { attributes } => attributes.as_ref(),
            WriteOutcome::ConditionFailed(_) => None,
        }
    }

    /// Decode the returned image, e.g. `ALL_OLD` into the shape type
    pub fn decode<D: Document>(&self) -> Result<Option<D>> {
        self.attributes().map(D::from_item).transpose()
    }
}

/// Result of a transactional write
#[derive(Debug, Clone, PartialEq)]
pub enum TransactOutcome {
    Committed,
    /// Nothing was written. One reason per write, in order; `None` for
    /// writes that did not cause the cancellation.
    Canceled { reasons: Vec<Option<String>> },
}

impl TransactOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactOutcome::Committed)
    }
}

/// Result of a batch get. A failed chunk does not hold back the others.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetOutcome<S> {
    pub items: Vec<S>,
    /// Keys that were not read, with the error of their chunk or
    /// `CapacityExceeded` when the store kept leaving them unprocessed
    pub failed: Vec<(Item, Error)>,
}

impl<S> BatchGetOutcome<S> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-request result of a batch write
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchWriteOutcome {
    pub written: usize,
    /// Requests the store still had not processed when retries ran out
    pub unprocessed: Vec<WriteRequest>,
    /// Requests of chunks the store rejected, with the error
    pub failed: Vec<(WriteRequest, Error)>,
}

impl BatchWriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty() && self.failed.is_empty()
    }
}

/// Runs request plans against a store client.
pub struct Executor<C> {
    client: Arc<C>,
    config: Arc<ExecutorConfig>,
}

impl<C> Clone for Executor<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

fn check_shape<S: Shape>(plan: &RequestPlan) -> Result<()> {
    let expected = S::declaration().name;
    if plan.shape == expected {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "plan was built for shape '{}', not '{}'",
            plan.shape, expected
        )))
    }
}

fn check_operation(plan: &RequestPlan, expected: &str, ok: bool) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "expected a {} plan, got {}",
            expected,
            plan.operation.name()
        )))
    }
}

impl<C: StoreClient> Executor<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            config: Arc::new(ExecutorConfig::default()),
        }
    }

    pub fn with_config(client: C, config: ExecutorConfig) -> Result<Self> {
        Self::from_shared(Arc::new(client), config)
    }

    /// Share one client between executors
    pub fn from_shared(client: Arc<C>, config: ExecutorConfig) -> Result<Self> {
        config.validate().map_err(Error::InvalidArgument)?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Send one request, retrying throttled attempts with backoff.
    pub(crate) async fn submit(&self, request: &StoreRequest) -> Result<StoreResponse> {
        let policy = &self.config.retry;
        let action = request.action();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(action, table = %request.table, attempt, "submitting request");

            match self.client.send(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(StoreError::Throttling(message)) => {
                    if attempt >= policy.total_attempts() {
                        info!(action, attempts = attempt, %message, "retry attempts exhausted");
                        return Err(Error::CapacityExceeded { attempts: attempt });
                    }
                    let delay = policy.jittered_backoff(attempt - 1, &mut rand::thread_rng());
                    warn!(
                        action,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %message,
                        "request throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    debug!(action, attempt, error = %err, "request failed");
                    return Err(err.into());
                }
            }
        }
    }

    /// Sleep before re-sending unprocessed batch entries
    async fn backoff(&self, retry: u32) {
        let delay = self.config.retry.jittered_backoff(retry, &mut rand::thread_rng());
        tokio::time::sleep(delay).await;
    }

    fn paged(&self, plan: &RequestPlan) -> RequestPlan {
        let mut plan = plan.clone();
        if plan.limit.is_none() {
            plan.limit = self.config.default_page_size;
        }
        plan
    }

    /// One page of raw items plus the cursor of the next page
    pub(crate) async fn fetch_items(&self, plan: &RequestPlan) -> Result<(Vec<Item>, Option<PageCursor>)> {
        let response = self.submit(&StoreRequest::from_plan(plan)).await?;
        let cursor = response
            .last_evaluated_key
            .map(|key| PageCursor::new(plan.shape.clone(), key));
        debug!(
            shape = %plan.shape,
            items = response.items.len(),
            more = cursor.is_some(),
            "fetched page"
        );
        Ok((response.items, cursor))
    }

    #[instrument(skip(self, plan), fields(shape = %plan.shape))]
    pub async fn get<S: Shape>(&self, plan: &RequestPlan) -> Result<Option<S>> {
        check_shape::<S>(plan)?;
        check_operation(plan, "get", matches!(plan.operation, Operation::Get { .. }))?;

        let response = self.submit(&StoreRequest::from_plan(plan)).await?;
        response.item.as_ref().map(S::from_item).transpose()
    }

    /// Lazily page through a query. Nothing is sent until the first item is requested.
    pub fn query<S: Shape>(&self, plan: &RequestPlan) -> Result<ItemStream<C, S>> {
        check_shape::<S>(plan)?;
        check_operation(plan, "query", matches!(plan.operation, Operation::Query { .. }))?;
        Ok(ItemStream::new(self.clone(), self.paged(plan)))
    }

    pub fn scan<S: Shape>(&self, plan: &RequestPlan) -> Result<ItemStream<C, S>> {
        check_shape::<S>(plan)?;
        check_operation(plan, "scan", matches!(plan.operation, Operation::Scan))?;
        Ok(ItemStream::new(self.clone(), self.paged(plan)))
    }

    /// Page through a query or scan, decoding into a projection type
    pub fn query_as<D: Document>(&self, plan: &RequestPlan) -> Result<ItemStream<C, D>> {
        check_operation(plan, "query or scan", plan.operation.is_paged())?;
        Ok(ItemStream::new(self.clone(), self.paged(plan)))
    }

    /// Fetch exactly one page. Fails if any item on the page does not decode.
    #[instrument(skip(self, plan), fields(shape = %plan.shape))]
    pub async fn fetch_page<S: Shape>(&self, plan: &RequestPlan) -> Result<Page<S>> {
        check_shape::<S>(plan)?;
        check_operation(plan, "query or scan", plan.operation.is_paged())?;

        let (items, cursor) = self.fetch_items(&self.paged(plan)).await?;
        let items = items.iter().map(S::from_item).collect::<Result<Vec<_>>>()?;
        Ok(Page { items, cursor })
    }

    /// Put, update or delete. A failed condition comes back as
    /// [`WriteOutcome::ConditionFailed`] and is never retried.
    #[instrument(skip(self, plan), fields(shape = %plan.shape, op = plan.operation.name()))]
    pub async fn write(&self, plan: &RequestPlan) -> Result<WriteOutcome> {
        check_operation(plan, "put, update or delete", plan.operation.is_write())?;

        match self.submit(&StoreRequest::from_plan(plan)).await {
            Ok(response) => Ok(WriteOutcome::Written {
                attributes: response.attributes,
            }),
            Err(Error::ConditionalCheckFailed(reason)) => {
                debug!(%reason, "condition not met");
                Ok(WriteOutcome::ConditionFailed(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Run independent writes with bounded concurrency. Outcomes are in input order.
    pub async fn write_all<I>(&self, plans: I) -> Vec<Result<WriteOutcome>>
    where
        I: IntoIterator<Item = RequestPlan>,
    {
        stream::iter(plans)
            .map(|plan| async move { self.write(&plan).await })
            .buffered(self.config.write_concurrency)
            .collect()
            .await
    }

    /// Apply a transaction. A canceled transaction, e.g. on a failed
    /// condition, comes back as [`TransactOutcome::Canceled`] and is not
    /// retried. Throttled submissions are retried like any other request.
    #[instrument(skip(self, plan))]
    pub async fn transact_write(&self, plan: &RequestPlan) -> Result<TransactOutcome> {
        let writes = match &plan.operation {
            Operation::TransactWrite { writes, .. } => writes.len(),
            _ => return Err(Error::InvalidArgument(format!("expected a transact_write plan, got {}", plan.operation.name()))),
        };

        match self.submit(&StoreRequest::from_plan(plan)).await {
            Ok(_) => {
                debug!(writes, "transaction committed");
                Ok(TransactOutcome::Committed)
            }
            Err(Error::TransactionCanceled(reasons)) => {
                debug!(writes, ?reasons, "transaction canceled");
                Ok(TransactOutcome::Canceled { reasons })
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch many keys in store-sized chunks. Order of the items is the store's.
    ///
    /// A chunk that fails is recorded in the outcome and the remaining chunks
    /// are still sent. Fails as a whole only if a returned item does not decode.
    #[instrument(skip(self, plan), fields(shape = %plan.shape))]
    pub async fn batch_get<S: Shape>(&self, plan: &RequestPlan) -> Result<BatchGetOutcome<S>> {
        check_shape::<S>(plan)?;
        let keys = match &plan.operation {
            Operation::BatchGet { keys } => keys,
            _ => return Err(Error::InvalidArgument(format!("expected a batch_get plan, got {}", plan.operation.name()))),
        };

        let mut base = StoreRequest::from_plan(plan);
        let mut items = Vec::with_capacity(keys.len());
        let mut failed = Vec::new();
        for chunk in keys.chunks(self.config.batch_get_size) {
            let mut pending = chunk.to_vec();
            let mut rounds: u32 = 0;
            while !pending.is_empty() {
                if rounds > 0 {
                    if rounds > self.config.retry.max_attempts {
                        info!(unprocessed = pending.len(), "batch get retries exhausted");
                        let err = Error::CapacityExceeded { attempts: rounds };
                        failed.extend(pending.drain(..).map(|key| (key, err.clone())));
                        break;
                    }
                    debug!(unprocessed = pending.len(), round = rounds, "retrying unprocessed keys");
                    self.backoff(rounds - 1).await;
                }
                let batch = std::mem::take(&mut pending);
                base.operation = Operation::BatchGet { keys: batch.clone() };
                match self.submit(&base).await {
                    Ok(response) => {
                        items.extend(response.items);
                        pending = response.unprocessed_keys;
                    }
                    Err(e) => {
                        warn!(keys = batch.len(), error = %e, "batch get chunk failed");
                        failed.extend(batch.into_iter().map(|key| (key, e.clone())));
                    }
                }
                rounds += 1;
            }
        }

        let items = items.iter().map(S::from_item).collect::<Result<Vec<_>>>()?;
        Ok(BatchGetOutcome { items, failed })
    }

    /// Unconditional puts and deletes in store-sized chunks. Entries the store
    /// keeps leaving unprocessed, and chunks it rejects, are reported in the
    /// outcome rather than failing the batch.
    #[instrument(skip(self, plan), fields(shape = %plan.shape))]
    pub async fn batch_write(&self, plan: &RequestPlan) -> Result<BatchWriteOutcome> {
        let requests = match &plan.operation {
            Operation::BatchWrite { requests } => requests,
            _ => return Err(Error::InvalidArgument(format!("expected a batch_write plan, got {}", plan.operation.name()))),
        };

        let mut base = StoreRequest::from_plan(plan);
        let mut outcome = BatchWriteOutcome::default();
        for chunk in requests.chunks(self.config.batch_write_size) {
            let mut pending = chunk.to_vec();
            let mut rounds: u32 = 0;
            while !pending.is_empty() {
                if rounds > 0 {
                    if rounds > self.config.retry.max_attempts {
                        warn!(unprocessed = pending.len(), "batch write retries exhausted");
                        outcome.unprocessed.append(&mut pending);
                        break;
                    }
                    debug!(unprocessed = pending.len(), round = rounds, "retrying unprocessed writes");
                    self.backoff(rounds - 1).await;
                }
                let batch = std::mem::take(&mut pending);
                let sent = batch.len();
                base.operation = Operation::BatchWrite {
                    requests: batch.clone(),
                };
                match self.submit(&base).await {
                    Ok(response) => {
                        pending = response.unprocessed_writes;
                        outcome.written += sent - pending.len().min(sent);
                    }
                    Err(e) => {
                        warn!(requests = sent, error = %e, "batch write chunk failed");
                        outcome
                            .failed
                            .extend(batch.into_iter().map(|request| (request, e.clone())));
                    }
                }
                rounds += 1;
            }
        }
        Ok(outcome)
    }
}
