//! Request builders
//!
//! Every builder is an immutable value: each method consumes the builder and
//! returns the new state, so a partially built request can be cloned and
//! extended independently. Nothing is validated until `build()`, which
//! either returns a [`RequestPlan`](crate::plan::RequestPlan) or the first
//! error found. No request exists before `build()` succeeds.

mod batch;
mod delete;
mod get;
mod put;
mod query;
mod scan;
mod transaction;
mod update;

pub use batch::{BatchGet, BatchWrite, MAX_BATCH_GET, MAX_BATCH_WRITE};
pub use delete::Delete;
pub use get::Get;
pub use put::Put;
pub use query::{Query, SortKeyCondition};
pub use scan::Scan;
pub use transaction::{Transaction, MAX_CLIENT_TOKEN_LEN, MAX_TRANSACT_WRITE};
pub use update::Update;

use crate::error::{Error, Result};
use crate::expression::Condition;
use crate::schema::{IndexKind, ShapeDescriptor};
use crate::plan::Consistency;
use crate::types::{AttributeValue, Item, PrimaryKey};
use std::collections::HashMap;

/// Check one key value against its declared attribute
fn check_key_value(shape: &ShapeDescriptor, name: &str, value: &AttributeValue) -> Result<()> {
    let attr = shape.require_attribute(name)?;
    if attr.kind.matches(value) {
        Ok(())
    } else {
        Err(Error::type_mismatch(name, &attr.kind, value.wire_type()))
    }
}

/// Turn primary key values into the store's key map
pub(crate) fn key_item(shape: &ShapeDescriptor, key: &PrimaryKey) -> Result<Item> {
    let mut item = HashMap::with_capacity(2);
    check_key_value(shape, &shape.partition_key, &key.partition)?;
    item.insert(shape.partition_key.clone(), key.partition.clone());

    match (&shape.sort_key, &key.sort) {
        (Some(name), Some(value)) => {
            check_key_value(shape, name, value)?;
            item.insert(name.clone(), value.clone());
        }
        (Some(name), None) => {
            return Err(Error::MissingKeyCondition(format!(
                "shape '{}' needs a value for sort key '{}'",
                shape.name, name
            )))
        }
        (None, Some(_)) => {
            return Err(Error::InvalidQuery(format!(
                "shape '{}' has no sort key",
                shape.name
            )))
        }
        (None, None) => {}
    }
    Ok(item)
}

/// Extract the key map from a full item
pub(crate) fn key_of_item(shape: &ShapeDescriptor, item: &Item) -> Result<Item> {
    let mut key = HashMap::with_capacity(2);
    for name in std::iter::once(&shape.partition_key).chain(shape.sort_key.as_ref()) {
        let value = item.get(name).ok_or_else(|| {
            Error::MalformedAttribute(format!("item has no value for key attribute '{}'", name))
        })?;
        check_key_value(shape, name, value)?;
        key.insert(name.clone(), value.clone());
    }
    Ok(key)
}

/// Hashable form of one key attribute value
#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) enum KeyPart<'a> {
    S(&'a str),
    N(&'a str),
    B(&'a [u8]),
    Other(String),
}

/// Canonical, hashable encoding of a key map: attribute names sorted, each
/// with its scalar value.
pub(crate) fn key_signature(key: &Item) -> Vec<(&str, KeyPart<'_>)> {
    let mut parts: Vec<_> = key
        .iter()
        .map(|(name, value)| {
            let part = match value {
                AttributeValue::S(s) => KeyPart::S(s.as_str()),
                AttributeValue::N(n) => KeyPart::N(n.as_str()),
                AttributeValue::B(b) => KeyPart::B(&b[..]),
                other => KeyPart::Other(format!("{:?}", other)),
            };
            (name.as_str(), part)
        })
        .collect();
    parts.sort_by(|a, b| a.0.cmp(b.0));
    parts
}

pub(crate) fn check_projection(shape: &ShapeDescriptor, projection: &[String]) -> Result<()> {
    projection
        .iter()
        .try_for_each(|name| shape.require_attribute(name).map(|_| ()))
}

pub(crate) fn check_conditions(shape: &ShapeDescriptor, conditions: &[Condition]) -> Result<()> {
    conditions.iter().try_for_each(|c| c.validate(shape))
}

/// Strongly consistent reads are not available on global indexes
pub(crate) fn check_consistency(
    shape: &ShapeDescriptor,
    index: Option<&str>,
    consistency: Consistency,
) -> Result<()> {
    if consistency != Consistency::Strong {
        return Ok(());
    }
    if let Some(name) = index {
        if let Some(idx) = shape.index(name) {
            if idx.kind == IndexKind::Global {
                return Err(Error::InvalidQuery(format!(
                    "strongly consistent read on global index '{}'",
                    name
                )));
            }
        }
    }
    Ok(())
}

pub(crate) fn check_limit(limit: Option<u32>) -> Result<()> {
    match limit {
        Some(0) => Err(Error::InvalidQuery("limit must be greater than zero".to_string())),
        _ => Ok(()),
    }
}
