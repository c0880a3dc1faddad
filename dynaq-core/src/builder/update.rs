/// Update builder for partial item updates
use super::{check_conditions, key_item};
use crate::codec::AttributeCodec;
use crate::document::Field;
use crate::error::{Error, Result};
use crate::expression::{validate_updates, Condition, ExpressionWriter, UpdateAction};
use crate::number::Number;
use crate::plan::{Operation, RequestPlan, ReturnValues};
use crate::schema::ShapeDescriptor;
use crate::types::{AttributeValue, PrimaryKey};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Update {
    shape: Arc<ShapeDescriptor>,
    key: PrimaryKey,
    actions: Vec<UpdateAction>,
    conditions: Vec<Condition>,
    return_values: ReturnValues,
}

fn encoded<T: AttributeCodec>(value: &T) -> AttributeValue {
    value.encode().unwrap_or(AttributeValue::Null)
}

impl Update {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>, key: PrimaryKey) -> Self {
        Self {
            shape,
            key,
            actions: Vec::new(),
            conditions: Vec::new(),
            return_values: ReturnValues::None,
        }
    }

    /// Add a raw action. Checked against the shape when built.
    pub fn action(mut self, action: UpdateAction) -> Self {
        self.actions.push(action);
        self
    }

    /// SET an attribute to a value
    pub fn set<S, T: AttributeCodec>(self, field: Field<S, T>, value: impl Into<T>) -> Self {
        self.action(UpdateAction::Set {
            attribute: field.name().to_string(),
            value: encoded(&value.into()),
        })
    }

    /// SET a nullable attribute to NULL
    pub fn set_null<S, T>(self, field: Field<S, T>) -> Self {
        self.action(UpdateAction::Set {
            attribute: field.name().to_string(),
            value: AttributeValue::Null,
        })
    }

    /// REMOVE an optional attribute
    pub fn remove<S, T>(self, field: Field<S, T>) -> Self {
        self.action(UpdateAction::Remove(field.name().to_string()))
    }

    pub fn increment<S, T>(self, field: Field<S, T>, by: impl Into<Number>) -> Self {
        self.action(UpdateAction::Increment {
            attribute: field.name().to_string(),
            by: by.into(),
        })
    }

    pub fn decrement<S, T>(self, field: Field<S, T>, by: impl Into<Number>) -> Self {
        self.action(UpdateAction::Decrement {
            attribute: field.name().to_string(),
            by: by.into(),
        })
    }

    /// ADD to a number, or add elements to a set
    pub fn add<S, T: AttributeCodec>(self, field: Field<S, T>, value: impl Into<T>) -> Self {
        self.action(UpdateAction::Add {
            attribute: field.name().to_string(),
            value: encoded(&value.into()),
        })
    }

    /// DELETE elements from a set
    pub fn delete_elements<S, T: AttributeCodec>(self, field: Field<S, T>, value: impl Into<T>) -> Self {
        self.action(UpdateAction::Delete {
            attribute: field.name().to_string(),
            value: encoded(&value.into()),
        })
    }

    /// Append elements to the end of a list
    pub fn append<S, T: AttributeCodec>(self, field: Field<S, Vec<T>>, values: Vec<T>) -> Self {
        self.action(UpdateAction::Append {
            attribute: field.name().to_string(),
            values: encoded(&values),
        })
    }

    /// Only update if the condition holds on the existing item. Conditions are ANDed.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Only update an existing item (no upsert)
    pub fn if_exists(self) -> Self {
        let partition_key = self.shape.partition_key.clone();
        self.condition(Condition::Exists(partition_key))
    }

    pub fn return_values(mut self, return_values: ReturnValues) -> Self {
        self.return_values = return_values;
        self
    }

    pub fn build(&self) -> Result<RequestPlan> {
        let key = key_item(&self.shape, &self.key)?;
        if self.actions.is_empty() {
            return Err(Error::InvalidQuery("update has no actions".to_string()));
        }
        validate_updates(&self.actions, &self.shape)?;
        check_conditions(&self.shape, &self.conditions)?;

        let mut writer = ExpressionWriter::new();
        let update = writer.update(&self.actions);
        let condition = writer.conjunction(&self.conditions);
        let (names, values) = writer.finish();

        let mut plan = RequestPlan::new(&self.shape.name, &self.shape.table, Operation::Update { key, update });
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
    use crate::fixtures::{orders, Order};
    use std::collections::HashSet;

    #[test]
    fn test_update_builder() {
        let plan = orders()
            .update(("A1", "2024-01-01"))
            .set(Order::CUSTOMER_ID, "C2")
            .increment(Order::TOTAL, 5)
            .add(Order::TAGS, HashSet::from(["gift".to_string()]))
            .remove(Order::NOTE)
            .append(Order::HISTORY, vec!["paid".to_string()])
            .if_exists()
            .return_values(ReturnValues::AllNew)
            .build()
            .unwrap();

        match &plan.operation {
            Operation::Update { key, update } => {
                assert_eq!(key.len(), 2);
                assert_eq!(
                    update,
                    "SET #n0 = :v0, #n1 = #n1 + :v1, #n4 = list_append(#n4, :v3) REMOVE #n3 ADD #n2 :v2"
                );
            }
            other => panic!("Expected Update, got {:?}", other),
        }
        assert_eq!(plan.condition.as_deref(), Some("attribute_exists(#n5)"));
        assert_eq!(plan.names["#n5"], "orderId");
        assert_eq!(plan.return_values, ReturnValues::AllNew);
    }

    #[test]
    fn test_update_set_null() {
        let ok = orders().update(("A1", "x")).set_null(Order::COUPON).build();
        assert!(ok.is_ok());

        let not_nullable = orders().update(("A1", "x")).set_null(Order::TOTAL).build();
        assert!(matches!(not_nullable, Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_empty_update() {
        let result = orders().update(("A1", "x")).build();
        assert!(matches!(result, Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_update_rejects_key_and_type_errors() {
        let key = orders().update(("A1", "x")).set(Order::CREATED_AT, "y").build();
        assert!(matches!(key, Err(Error::InvalidQuery(_))));

        let mismatch = orders()
            .update(("A1", "x"))
            .action(UpdateAction::Set {
                attribute: "total".into(),
                value: AttributeValue::string("many"),
            })
            .build();
        assert!(matches!(mismatch, Err(Error::TypeMismatch { .. })));

        let increment_text = orders().update(("A1", "x")).increment(Order::CUSTOMER_ID, 1).build();
        assert!(matches!(increment_text, Err(Error::TypeMismatch { .. })));

        let bad_condition = orders()
            .update(("A1", "x"))
            .increment(Order::TOTAL, 1)
            .condition(attr("missing").exists())
            .build();
        assert!(matches!(bad_condition, Err(Error::UnknownAttribute { .. })));
    }
}
