//! Request plans: the validated, fully rendered form of a built request.

use crate::error::{Error, Result};
use crate::types::{AttributeValue, Item};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Read consistency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Consistency {
    #[default]
    Eventual,
    Strong,
}

/// Which item image a write returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReturnValues {
    #[default]
    None,
    AllOld,
    UpdatedOld,
    AllNew,
    UpdatedNew,
}

impl ReturnValues {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnValues::None => "NONE",
            ReturnValues::AllOld => "ALL_OLD",
            ReturnValues::UpdatedOld => "UPDATED_OLD",
            ReturnValues::AllNew => "ALL_NEW",
            ReturnValues::UpdatedNew => "UPDATED_NEW",
        }
    }
}

/// One segment of a parallel scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub segment: u32,
    pub total: u32,
}

/// One entry of a batch write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(Item),
}

impl WriteRequest {
    /// The item (for puts) or key (for deletes)
    pub fn item(&self) -> &Item {
        match self {
            WriteRequest::Put(item) | WriteRequest::Delete(item) => item,
        }
    }
}

/// Operation payload
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Get { key: Item },
    Query { key_condition: String },
    Scan,
    Put { item: Item },
    Update { key: Item, update: String },
    Delete { key: Item },
    BatchGet { keys: Vec<Item> },
    BatchWrite { requests: Vec<WriteRequest> },
    /// Puts, updates and deletes applied all or nothing, possibly across tables
    TransactWrite {
        writes: Vec<RequestPlan>,
        client_token: Option<String>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Get { .. } => "get",
            Operation::Query { .. } => "query",
            Operation::Scan => "scan",
            Operation::Put { .. } => "put",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::BatchGet { .. } => "batch_get",
            Operation::BatchWrite { .. } => "batch_write",
            Operation::TransactWrite { .. } => "transact_write",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::Put { .. } | Operation::Update { .. } | Operation::Delete { .. }
        )
    }

    pub fn is_paged(&self) -> bool {
        matches!(self, Operation::Query { .. } | Operation::Scan)
    }
}

/// A request ready for execution.
///
/// Built by the request builders; equal builder state always yields an equal
/// plan. Names and values hold the placeholder bindings for every
/// expression in the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub shape: String,
    pub table: String,
    pub operation: Operation,
    pub filter: Option<String>,
    pub condition: Option<String>,
    pub projection: Option<String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, AttributeValue>,
    pub index: Option<String>,
    pub consistency: Consistency,
    pub limit: Option<u32>,
    pub cursor: Option<PageCursor>,
    /// Ascending sort-key order
    pub forward: bool,
    pub segment: Option<Segment>,
    pub return_values: ReturnValues,
}

impl RequestPlan {
    pub(crate) fn new(shape: &str, table: &str, operation: Operation) -> Self {
        Self {
            shape: shape.to_string(),
            table: table.to_string(),
            operation,
            filter: None,
            condition: None,
            projection: None,
            names: BTreeMap::new(),
            values: BTreeMap::new(),
            index: None,
            consistency: Consistency::Eventual,
            limit: None,
            cursor: None,
            forward: true,
            segment: None,
            return_values: ReturnValues::None,
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Same plan, continuing from another page cursor
    pub fn with_cursor(&self, cursor: Option<PageCursor>) -> RequestPlan {
        let mut plan = self.clone();
        plan.cursor = cursor;
        plan
    }
}

/// Position in a paged result: the store's last evaluated key plus the shape
/// it was issued for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    pub shape: String,
    pub key: Item,
}

impl PageCursor {
    pub fn new(shape: impl Into<String>, key: Item) -> Self {
        Self {
            shape: shape.into(),
            key,
        }
    }

    /// Opaque token for handing to external callers
    pub fn token(&self) -> String {
        // Serializing a map of attribute values cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn from_token(token: &str) -> Result<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|e| Error::InvalidCursor(format!("not a cursor token: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| Error::InvalidCursor(format!("not a cursor token: {}", e)))
    }

    /// Fail unless the cursor was issued for `shape`
    pub fn check_shape(&self, shape: &str) -> Result<()> {
        if self.shape == shape {
            Ok(())
        } else {
            Err(Error::InvalidCursor(format!(
                "cursor was issued for shape '{}', not '{}'",
                self.shape, shape
            )))
        }
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cursor() -> PageCursor {
        PageCursor::new(
            "Order",
            HashMap::from([
                ("orderId".to_string(), AttributeValue::string("A1")),
                ("createdAt".to_string(), AttributeValue::string("2024-01-01")),
            ]),
        )
    }

    #[test]
    fn test_cursor_token_roundtrip() {
        let c = cursor();
        let token = c.token();
        assert!(!token.contains('='));
        assert_eq!(PageCursor::from_token(&token).unwrap(), c);
    }

    #[test]
    fn test_cursor_token_garbage() {
        assert!(matches!(PageCursor::from_token("%%%"), Err(Error::InvalidCursor(_))));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(PageCursor::from_token(&not_json), Err(Error::InvalidCursor(_))));
    }

    #[test]
    fn test_cursor_shape_check() {
        let c = cursor();
        assert!(c.check_shape("Order").is_ok());
        assert!(matches!(c.check_shape("Customer"), Err(Error::InvalidCursor(_))));
    }

    #[test]
    fn test_operation_classes() {
        assert!(Operation::Scan.is_paged());
        assert!(Operation::Put { item: HashMap::new() }.is_write());
        assert!(!Operation::Get { key: HashMap::new() }.is_write());
        assert_eq!(ReturnValues::AllNew.as_str(), "ALL_NEW");
    }
}
