//! Transactional writes: puts, updates and deletes that the store applies
//! all together or not at all.
//!
//! Writes may target different shapes and tables. The store cancels the
//! whole transaction when any write's condition fails.
use super::{key_signature, Delete, Put, Update};
use crate::error::{Error, Result};
use crate::plan::{Operation, RequestPlan, ReturnValues};
use crate::types::Item;
use std::collections::HashSet;

/// Store limit for writes in one transaction
pub const MAX_TRANSACT_WRITE: usize = 100;

/// Store limit for the length of a client request token
pub const MAX_CLIENT_TOKEN_LEN: usize = 36;

#[derive(Debug, Clone)]
enum TransactWrite {
    Put(Put),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, Default)]
pub struct Transaction {
    writes: Vec<TransactWrite>,
    client_token: Option<String>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, put: Put) -> Self {
        self.writes.push(TransactWrite::Put(put));
        self
    }

    pub fn update(mut self, update: Update) -> Self {
        self.writes.push(TransactWrite::Update(update));
        self
    }

    pub fn delete(mut self, delete: Delete) -> Self {
        self.writes.push(TransactWrite::Delete(delete));
        self
    }

    /// Idempotency token. Resubmitting a transaction with the same token
    /// has the effect of a single submission.
    pub fn client_request_token(mut self, token: impl Into<String>) -> Self {
        self.client_token = Some(token.into());
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn build(&self) -> Result<RequestPlan> {
        if self.writes.is_empty() {
            return Err(Error::InvalidQuery("transaction has no writes".to_string()));
        }
        if self.writes.len() > MAX_TRANSACT_WRITE {
            return Err(Error::InvalidQuery(format!(
                "transaction has {} writes, the limit is {}",
                self.writes.len(),
                MAX_TRANSACT_WRITE
            )));
        }
        if let Some(token) = &self.client_token {
            if token.is_empty() || token.len() > MAX_CLIENT_TOKEN_LEN {
                return Err(Error::InvalidQuery(format!(
                    "client request token must be 1 to {} characters",
                    MAX_CLIENT_TOKEN_LEN
                )));
            }
        }

        let mut writes = Vec::with_capacity(self.writes.len());
        let mut targets: Vec<(String, Item)> = Vec::with_capacity(self.writes.len());
        for write in &self.writes {
            let (plan, key) = match write {
                TransactWrite::Put(put) => (put.build()?, put.key()?),
                TransactWrite::Update(update) => {
                    let plan = update.build()?;
                    let key = written_key(&plan)?;
                    (plan, key)
                }
                TransactWrite::Delete(delete) => {
                    let plan = delete.build()?;
                    let key = written_key(&plan)?;
                    (plan, key)
                }
            };
            if plan.return_values != ReturnValues::None {
                return Err(Error::InvalidQuery(format!(
                    "{} inside a transaction cannot return {}",
                    plan.operation.name(),
                    plan.return_values.as_str()
                )));
            }
            targets.push((plan.table.clone(), key));
            writes.push(plan);
        }

        let mut seen = HashSet::with_capacity(targets.len());
        for (table, key) in &targets {
            if !seen.insert((table.as_str(), key_signature(key))) {
                return Err(Error::InvalidQuery(format!(
                    "transaction writes the same item of '{}' more than once: {:?}",
                    table, key
                )));
            }
        }

        Ok(RequestPlan::new(
            "",
            "",
            Operation::TransactWrite {
                writes,
                client_token: self.client_token.clone(),
            },
        ))
    }
}

fn written_key(plan: &RequestPlan) -> Result<Item> {
    match &plan.operation {
        Operation::Update { key, .. } | Operation::Delete { key } => Ok(key.clone()),
        other => Err(Error::InvalidQuery(format!(
            "{} cannot be part of a transaction",
            other.name()
        ))),
    }
}
