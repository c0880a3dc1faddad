use crate::builder::{BatchGet, BatchWrite, Delete, Get, Put, Query, Scan, Update};
use crate::document::{CompiledShape, Mapper, Shape};
use crate::error::{Error, Result};
use crate::schema::{SchemaCompiler, ShapeDescriptor};
use crate::types::PrimaryKey;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed entry point for building requests against one shape's table.
///
/// ```ignore
/// let orders = registry.table::<Order>()?;
/// let plan = orders.query().partition("A1").sk_begins_with("2024-").build()?;
/// ```
pub struct Table<S> {
    compiled: CompiledShape,
    _marker: PhantomData<fn() -> S>,
}

impl<S> Clone for Table<S> {
    fn clone(&self) -> Self {
        Self {
            compiled: self.compiled.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S> fmt::Debug for Table<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("shape", &self.compiled.descriptor.name)
            .field("table", &self.compiled.descriptor.table)
            .finish()
    }
}

impl<S: Shape> Table<S> {
    /// Compile the shape without registering it
    pub fn compile() -> Result<Self> {
        let descriptor = SchemaCompiler::compile(S::declaration())?;
        Ok(Self {
            compiled: CompiledShape::new(descriptor, Mapper::of::<S>()),
            _marker: PhantomData,
        })
    }

    pub(crate) fn from_compiled(compiled: CompiledShape) -> Result<Self> {
        if !compiled.mapper.maps::<S>() {
            return Err(Error::DuplicateShape(format!(
                "'{}' is registered for {}",
                compiled.descriptor.name,
                compiled.mapper.type_name()
            )));
        }
        Ok(Self {
            compiled,
            _marker: PhantomData,
        })
    }

    pub fn descriptor(&self) -> &Arc<ShapeDescriptor> {
        &self.compiled.descriptor
    }

    pub fn compiled(&self) -> &CompiledShape {
        &self.compiled
    }

    pub fn get(&self, key: impl Into<PrimaryKey>) -> Get {
        Get::new(self.descriptor().clone(), key.into())
    }

    pub fn query(&self) -> Query {
        Query::new(self.descriptor().clone())
    }

    pub fn scan(&self) -> Scan {
        Scan::new(self.descriptor().clone())
    }

    pub fn put(&self, record: &S) -> Put {
        Put::new(self.descriptor().clone(), record.to_item())
    }

    pub fn update(&self, key: impl Into<PrimaryKey>) -> Update {
        Update::new(self.descriptor().clone(), key.into())
    }

    pub fn delete(&self, key: impl Into<PrimaryKey>) -> Delete {
        Delete::new(self.descriptor().clone(), key.into())
    }

    /// Delete the item with the same key as `record`
    pub fn delete_item(&self, record: &S) -> Delete {
        Delete::for_item(self.descriptor().clone(), record.to_item())
    }

    pub fn batch_get(&self) -> BatchGet {
        BatchGet::new(self.descriptor().clone())
    }

    pub fn batch_write(&self) -> BatchWrite<S> {
        BatchWrite::new(self.descriptor().clone())
    }
}
