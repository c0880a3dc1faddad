// Lets the derive's `::dynaq_core::` paths resolve inside this crate's own tests.
extern crate self as dynaq_core;

pub mod error;
pub mod number;
pub mod types;
pub mod codec;
pub mod schema; // declarations + SchemaCompiler
pub mod document;
pub mod registry;
pub mod expression; // conditions, update actions, placeholder rendering
pub mod plan;
pub mod builder;
pub mod table;
pub mod retry;

#[cfg(test)]
mod fixtures;

pub use builder::Transaction;
pub use codec::{decode_attribute, encode_attribute, AttributeCodec, KeyAttribute, SetElement};
pub use document::{CompiledShape, Document, Field, Mapper, Shape};
pub use dynaq_derive::{Document, Shape};
pub use error::{Error, Result};
pub use expression::{attr, Comparator, Condition, UpdateAction};
pub use number::Number;
pub use plan::{Consistency, Operation, PageCursor, RequestPlan, ReturnValues, Segment, WriteRequest};
pub use registry::MetamodelRegistry;
pub use retry::{Jitter, RetryPolicy};
pub use schema::{SchemaCompiler, ShapeDescriptor};
pub use table::Table;
pub use types::*;
