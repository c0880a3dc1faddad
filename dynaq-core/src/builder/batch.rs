/// Batch builders: many keys or writes against one shape's table.
///
/// A plan may hold any number of entries; the engine splits it into
/// store-sized chunks.
use super::{check_projection, key_item, key_signature};
use crate::document::Shape;
use crate::error::{Error, Result};
use crate::expression::ExpressionWriter;
use crate::plan::{Consistency, Operation, RequestPlan, WriteRequest};
use crate::schema::ShapeDescriptor;
use crate::types::{Item, PrimaryKey};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Store limit for keys in one batch get
pub const MAX_BATCH_GET: usize = 100;

/// Store limit for puts and deletes in one batch write
pub const MAX_BATCH_WRITE: usize = 25;

fn reject_duplicates(keys: &[Item]) -> Result<()> {
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        if !seen.insert(key_signature(key)) {
            return Err(Error::InvalidQuery(format!("duplicate key in batch: {:?}", key)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct BatchGet {
    shape: Arc<ShapeDescriptor>,
    keys: Vec<PrimaryKey>,
    projection: Vec<String>,
    consistency: Consistency,
}

impl BatchGet {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>) -> Self {
        Self {
            shape,
            keys: Vec::new(),
            projection: Vec::new(),
            consistency: Consistency::Eventual,
        }
    }

    pub fn key(mut self, key: impl Into<PrimaryKey>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn keys<K: Into<PrimaryKey>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn project<I, N>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.projection.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn consistent_read(mut self) -> Self {
        self.consistency = Consistency::Strong;
        self
    }

    pub fn build(&self) -> Result<RequestPlan> {
        if self.keys.is_empty() {
            return Err(Error::InvalidQuery("batch get has no keys".to_string()));
        }
        let keys = self
            .keys
            .iter()
            .map(|k| key_item(&self.shape, k))
            .collect::<Result<Vec<_>>>()?;
        reject_duplicates(&keys)?;
        check_projection(&self.shape, &self.projection)?;

        let mut writer = ExpressionWriter::new();
        let projection = (!self.projection.is_empty()).then(|| writer.projection(&self.projection));
        let (names, values) = writer.finish();

        let mut plan = RequestPlan::new(&self.shape.name, &self.shape.table, Operation::BatchGet { keys });
        plan.projection = projection;
        plan.names = names;
        plan.values = values;
        plan.consistency = self.consistency;
        Ok(plan)
    }
}

#[derive(Clone)]
enum PendingWrite {
    Put(Item),
    Delete(PrimaryKey),
}

/// Unconditional puts and deletes of one shape
pub struct BatchWrite<S> {
    shape: Arc<ShapeDescriptor>,
    writes: Vec<PendingWrite>,
    _marker: PhantomData<fn() -> S>,
}

impl<S> Clone for BatchWrite<S> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            writes: self.writes.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S> fmt::Debug for BatchWrite<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWrite")
            .field("shape", &self.shape.name)
            .field("writes", &self.writes.len())
            .finish()
    }
}

impl<S: Shape> BatchWrite<S> {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>) -> Self {
        Self {
            shape,
            writes: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn put(mut self, record: &S) -> Self {
        self.writes.push(PendingWrite::Put(record.to_item()));
        self
    }

    pub fn put_all<'a>(mut self, records: impl IntoIterator<Item = &'a S>) -> Self {
        self.writes
            .extend(records.into_iter().map(|r| PendingWrite::Put(r.to_item())));
        self
    }

    pub fn delete(mut self, key: impl Into<PrimaryKey>) -> Self {
        self.writes.push(PendingWrite::Delete(key.into()));
        self
    }

    pub fn build(&self) -> Result<RequestPlan> {
        if self.writes.is_empty() {
            return Err(Error::InvalidQuery("batch write has no requests".to_string()));
        }

        let mut keys = Vec::with_capacity(self.writes.len());
        let mut requests = Vec::with_capacity(self.writes.len());
        for write in &self.writes {
            match write {
                PendingWrite::Put(item) => {
                    keys.push(super::key_of_item(&self.shape, item)?);
                    requests.push(WriteRequest::Put(item.clone()));
                }
                PendingWrite::Delete(key) => {
                    let key = key_item(&self.shape, key)?;
                    keys.push(key.clone());
                    requests.push(WriteRequest::Delete(key));
                }
            }
        }
        reject_duplicates(&keys)?;

        Ok(RequestPlan::new(
            &self.shape.name,
            &self.shape.table,
            Operation::BatchWrite { requests },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{order, orders};

    #[test]
    fn test_batch_get_builder() {
        let plan = orders()
            .batch_get()
            .key(("A1", "2024-01-01"))
            .keys((0..150).map(|i| (format!("B{}", i), "2024-01-01")))
            .build()
            .unwrap();
        match &plan.operation {
            Operation::BatchGet { keys } => assert_eq!(keys.len(), 151),
            other => panic!("Expected BatchGet, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_get_rejects_bad_keys() {
        assert!(matches!(orders().batch_get().build(), Err(Error::InvalidQuery(_))));
        assert!(matches!(
            orders().batch_get().key("A1").build(),
            Err(Error::MissingKeyCondition(_))
        ));
        assert!(matches!(
            orders().batch_get().key(("A1", "x")).key(("A1", "x")).build(),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_batch_write_builder() {
        let records: Vec<_> = (0..30).map(|i| order(&format!("A{}", i), "2024-01-01", i)).collect();
        let plan = orders()
            .batch_write()
            .put_all(&records)
            .delete(("Z9", "2023-12-31"))
            .build()
            .unwrap();
        match &plan.operation {
            Operation::BatchWrite { requests } => {
                assert_eq!(requests.len(), 31);
                assert!(matches!(requests[30], WriteRequest::Delete(_)));
            }
            other => panic!("Expected BatchWrite, got {:?}", other),
        }

        let many: Vec<_> = (0..2000).map(|i| order(&format!("M{}", i), "2024-01-01", i)).collect();
        let plan = orders().batch_write().put_all(&many).put(&many[1234]).build();
        assert!(matches!(plan, Err(Error::InvalidQuery(_))));

        let dup = orders()
            .batch_write()
            .put(&records[0])
            .delete(("A0", "2024-01-01"))
            .build();
        assert!(matches!(dup, Err(Error::InvalidQuery(_))));
    }
}
