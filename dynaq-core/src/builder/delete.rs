use super::{check_conditions, key_item, key_of_item};
use crate::error::{Error, Result};
use crate::expression::{Condition, ExpressionWriter};
use crate::plan::{Operation, RequestPlan, ReturnValues};
use crate::schema::ShapeDescriptor;
use crate::types::{Item, PrimaryKey};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Target {
    Key(PrimaryKey),
    Item(Item),
}

/// Delete one item by key
#[derive(Debug, Clone)]
pub struct Delete {
    shape: Arc<ShapeDescriptor>,
    target: Target,
    conditions: Vec<Condition>,
    return_values: ReturnValues,
}

impl Delete {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>, key: PrimaryKey) -> Self {
        Self {
            shape,
            target: Target::Key(key),
            conditions: Vec::new(),
            return_values: ReturnValues::None,
        }
    }

    pub(crate) fn for_item(shape: Arc<ShapeDescriptor>, item: Item) -> Self {
        Self {
            shape,
            target: Target::Item(item),
            conditions: Vec::new(),
            return_values: ReturnValues::None,
        }
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Fail with a conditional-check outcome when there is nothing to delete
    pub fn if_exists(self) -> Self {
        let partition_key = self.shape.partition_key.clone();
        self.condition(Condition::Exists(partition_key))
    }

    /// `None` or `AllOld`
    pub fn return_values(mut self, return_values: ReturnValues) -> Self {
        self.return_values = return_values;
        self
    }

    pub fn build(&self) -> Result<RequestPlan> {
        let key = match &self.target {
            Target::Key(key) => key_item(&self.shape, key)?,
            Target::Item(item) => key_of_item(&self.shape, item)?,
        };
        check_conditions(&self.shape, &self.conditions)?;
        if !matches!(self.return_values, ReturnValues::None | ReturnValues::AllOld) {
            return Err(Error::InvalidQuery(format!(
                "delete cannot return {}",
                self.return_values.as_str()
            )));
        }

        let mut writer = ExpressionWriter::new();
        let condition = writer.conjunction(&self.conditions);
        let (names, values) = writer.finish();

        let mut plan = RequestPlan::new(&self.shape.name, &self.shape.table, Operation::Delete { key });
        plan.condition = condition;
        plan.names = names;
        plan.values = values;
        plan.return_values = self.return_values;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::attr;
    use crate::fixtures::{order, orders};
    use crate::types::AttributeValue;

    #[test]
    fn test_delete_by_key() {
        let plan = orders()
            .delete(("A1", "2024-01-01"))
            .if_exists()
            .return_values(ReturnValues::AllOld)
            .build()
            .unwrap();
        match &plan.operation {
            Operation::Delete { key } => assert_eq!(key["orderId"], AttributeValue::string("A1")),
            other => panic!("Expected Delete, got {:?}", other),
        }
        assert_eq!(plan.condition.as_deref(), Some("attribute_exists(#n0)"));
    }

    #[test]
    fn test_delete_from_record() {
        let by_item = orders().delete_item(&order("A1", "2024-01-01", 5)).build().unwrap();
        let by_key = orders().delete(("A1", "2024-01-01")).build().unwrap();
        assert_eq!(by_item, by_key);
    }

    #[test]
    fn test_delete_condition_checked() {
        let result = orders()
            .delete(("A1", "2024-01-01"))
            .condition(attr("total").eq("free"))
            .build();
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));

        let result = orders()
            .delete(("A1", "2024-01-01"))
            .return_values(ReturnValues::UpdatedNew)
            .build();
        assert!(matches!(result, Err(Error::InvalidQuery(_))));
    }
}
