use super::{check_projection, key_item};
use crate::error::Result;
use crate::expression::ExpressionWriter;
use crate::plan::{Consistency, Operation, RequestPlan};
use crate::schema::ShapeDescriptor;
use crate::types::PrimaryKey;
use std::sync::Arc;

/// Single-item read by primary key
#[derive(Debug, Clone)]
pub struct Get {
    shape: Arc<ShapeDescriptor>,
    key: PrimaryKey,
    projection: Vec<String>,
    consistency: Consistency,
}

impl Get {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>, key: PrimaryKey) -> Self {
        Self {
            shape,
            key,
            projection: Vec::new(),
            consistency: Consistency::Eventual,
        }
    }

    /// Only return the named attributes
    pub fn project<I, N>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.projection.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Strongly consistent read
    pub fn consistent_read(self) -> Self {
        self.consistency(Consistency::Strong)
    }

    pub fn build(&self) -> Result<RequestPlan> {
        let key = key_item(&self.shape, &self.key)?;
        check_projection(&self.shape, &self.projection)?;

        let mut writer = ExpressionWriter::new();
        let projection = (!self.projection.is_empty()).then(|| writer.projection(&self.projection));
        let (names, values) = writer.finish();

        let mut plan = RequestPlan::new(&self.shape.name, &self.shape.table, Operation::Get { key });
        plan.projection = projection;
        plan.names = names;
        plan.values = values;
        plan.consistency = self.consistency;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::fixtures::{orders, Order};
    use crate::plan::{Consistency, Operation};
    use crate::types::AttributeValue;

    #[test]
    fn test_get_builder() {
        let plan = orders()
            .get(("A1", "2024-01-01"))
            .project([Order::TOTAL.name()])
            .consistent_read()
            .build()
            .unwrap();

        match &plan.operation {
            Operation::Get { key } => {
                assert_eq!(key["orderId"], AttributeValue::string("A1"));
                assert_eq!(key["createdAt"], AttributeValue::string("2024-01-01"));
            }
            other => panic!("Expected Get, got {:?}", other),
        }
        assert_eq!(plan.table, "orders");
        assert_eq!(plan.projection.as_deref(), Some("#n0"));
        assert_eq!(plan.names["#n0"], "total");
        assert_eq!(plan.consistency, Consistency::Strong);
    }

    #[test]
    fn test_get_requires_sort_key() {
        assert!(matches!(orders().get("A1").build(), Err(Error::MissingKeyCondition(_))));
    }

    #[test]
    fn test_get_key_type_mismatch() {
        match orders().get((7, "2024-01-01")).build() {
            Err(Error::TypeMismatch { attribute, .. }) => assert_eq!(attribute, "orderId"),
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_get_unknown_projection() {
        let result = orders().get(("A1", "x")).project(["nope"]).build();
        assert!(matches!(result, Err(Error::UnknownAttribute { .. })));
    }
}
