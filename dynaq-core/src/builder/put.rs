use super::{check_conditions, key_of_item};
use crate::error::{Error, Result};
use crate::expression::{Condition, ExpressionWriter};
use crate::plan::{Operation, RequestPlan, ReturnValues};
use crate::schema::ShapeDescriptor;
use crate::types::Item;
use std::sync::Arc;

/// Write a whole record, replacing any item with the same key
#[derive(Debug, Clone)]
pub struct Put {
    shape: Arc<ShapeDescriptor>,
    item: Item,
    conditions: Vec<Condition>,
    return_values: ReturnValues,
}

impl Put {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>, item: Item) -> Self {
        Self {
            shape,
            item,
            conditions: Vec::new(),
            return_values: ReturnValues::None,
        }
    }

    /// Only write if the condition holds on the existing item. Conditions are ANDed.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Only write if no item with this key exists yet
    pub fn if_not_exists(self) -> Self {
        let partition_key = self.shape.partition_key.clone();
        self.condition(Condition::NotExists(partition_key))
    }

    /// `None` or `AllOld`
    pub fn return_values(mut self, return_values: ReturnValues) -> Self {
        self.return_values = return_values;
        self
    }

    /// Key of the record being written
    pub(crate) fn key(&self) -> Result<Item> {
        key_of_item(&self.shape, &self.item)
    }

    pub fn build(&self) -> Result<RequestPlan> {
        key_of_item(&self.shape, &self.item)?;
        check_conditions(&self.shape, &self.conditions)?;
        if !matches!(self.return_values, ReturnValues::None | ReturnValues::AllOld) {
            return Err(Error::InvalidQuery(format!(
                "put cannot return {}",
                self.return_values.as_str()
            )));
        }

        let mut writer = ExpressionWriter::new();
        let condition = writer.conjunction(&self.conditions);
        let (names, values) = writer.finish();

        let mut plan = RequestPlan::new(
            &self.shape.name,
            &self.shape.table,
            Operation::Put {
                item: self.item.clone(),
            },
        );
        plan.condition = condition;
        plan.names = names;
        plan.values = values;
        plan.return_values = self.return_values;
        Ok(plan)
    }
}
