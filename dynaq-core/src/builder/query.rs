/// Query builder: items of one partition, optionally narrowed by sort key
use super::{check_conditions, check_consistency, check_limit, check_projection};
use crate::error::{Error, Result};
use crate::expression::{Comparator, Condition, ExpressionWriter};
use crate::plan::{Consistency, Operation, PageCursor, RequestPlan};
use crate::schema::ShapeDescriptor;
use crate::types::AttributeValue;
use std::sync::Arc;

/// Sort key condition of a query
#[derive(Debug, Clone, PartialEq)]
pub enum SortKeyCondition {
    Equal(AttributeValue),
    LessThan(AttributeValue),
    LessThanOrEqual(AttributeValue),
    GreaterThan(AttributeValue),
    GreaterThanOrEqual(AttributeValue),
    Between(AttributeValue, AttributeValue),
    BeginsWith(AttributeValue),
}

impl SortKeyCondition {
    fn on(self, attribute: &str) -> Condition {
        let attribute = attribute.to_string();
        let compare = |op, value| Condition::Compare {
            attribute: attribute.clone(),
            op,
            value,
        };
        match self {
            SortKeyCondition::Equal(v) => compare(Comparator::Eq, v),
            SortKeyCondition::LessThan(v) => compare(Comparator::Lt, v),
            SortKeyCondition::LessThanOrEqual(v) => compare(Comparator::Le, v),
            SortKeyCondition::GreaterThan(v) => compare(Comparator::Gt, v),
            SortKeyCondition::GreaterThanOrEqual(v) => compare(Comparator::Ge, v),
            SortKeyCondition::Between(low, high) => Condition::Between {
                attribute: attribute.clone(),
                low,
                high,
            },
            SortKeyCondition::BeginsWith(prefix) => Condition::BeginsWith {
                attribute: attribute.clone(),
                prefix,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    shape: Arc<ShapeDescriptor>,
    index: Option<String>,
    partition: Option<AttributeValue>,
    sort: Option<SortKeyCondition>,
    key_conditions: Vec<Condition>,
    filters: Vec<Condition>,
    projection: Vec<String>,
    consistency: Consistency,
    limit: Option<u32>,
    cursor: Option<PageCursor>,
    forward: bool,
    pending: Option<Error>,
}

impl Query {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>) -> Self {
        Self {
            shape,
            index: None,
            partition: None,
            sort: None,
            key_conditions: Vec::new(),
            filters: Vec::new(),
            projection: Vec::new(),
            consistency: Consistency::Eventual,
            limit: None,
            cursor: None,
            forward: true,
            pending: None,
        }
    }

    /// Partition key equality (on the table or the selected index)
    pub fn partition(mut self, value: impl Into<AttributeValue>) -> Self {
        self.partition = Some(value.into());
        self
    }

    pub fn sort(mut self, condition: SortKeyCondition) -> Self {
        self.sort = Some(condition);
        self
    }

    pub fn sk_eq(self, value: impl Into<AttributeValue>) -> Self {
        self.sort(SortKeyCondition::Equal(value.into()))
    }

    pub fn sk_lt(self, value: impl Into<AttributeValue>) -> Self {
        self.sort(SortKeyCondition::LessThan(value.into()))
    }

    pub fn sk_lte(self, value: impl Into<AttributeValue>) -> Self {
        self.sort(SortKeyCondition::LessThanOrEqual(value.into()))
    }

    pub fn sk_gt(self, value: impl Into<AttributeValue>) -> Self {
        self.sort(SortKeyCondition::GreaterThan(value.into()))
    }

    pub fn sk_gte(self, value: impl Into<AttributeValue>) -> Self {
        self.sort(SortKeyCondition::GreaterThanOrEqual(value.into()))
    }

    pub fn sk_between(self, low: impl Into<AttributeValue>, high: impl Into<AttributeValue>) -> Self {
        self.sort(SortKeyCondition::Between(low.into(), high.into()))
    }

    pub fn sk_begins_with(self, prefix: impl Into<AttributeValue>) -> Self {
        self.sort(SortKeyCondition::BeginsWith(prefix.into()))
    }

    /// Key condition from typed field predicates, e.g.
    /// `key(Order::ORDER_ID.eq("A1"))`. Conditions are ANDed.
    pub fn key(mut self, condition: Condition) -> Self {
        self.key_conditions.push(condition);
        self
    }

    /// Filter applied by the store after the key condition. Filters are ANDed.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
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

    /// Query a secondary index instead of the table
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn consistent_read(self) -> Self {
        self.consistency(Consistency::Strong)
    }

    /// Maximum number of items the store evaluates per page
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume after a previously returned cursor
    pub fn start_from(mut self, cursor: PageCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Resume from an opaque cursor token
    pub fn start_from_token(mut self, token: &str) -> Self {
        match PageCursor::from_token(token) {
            Ok(cursor) => self.cursor = Some(cursor),
            Err(e) => self.pending = Some(e),
        }
        self
    }

    /// Set the scan direction (default: forward)
    pub fn forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    /// Descending sort-key order
    pub fn reverse(self) -> Self {
        self.forward(false)
    }

    pub fn build(&self) -> Result<RequestPlan> {
        if let Some(e) = &self.pending {
            return Err(e.clone());
        }

        let shape = &self.shape;
        let (pk, sk) = shape.key_schema(self.index.as_deref())?;
        check_consistency(shape, self.index.as_deref(), self.consistency)?;

        let (partition, sort) = self.key_clauses(pk, sk)?;
        partition.validate(shape)?;
        if let Some(sort) = &sort {
            sort.validate(shape)?;
        }

        check_conditions(shape, &self.filters)?;
        for filter in &self.filters {
            if let Some(key) = filter.attributes().into_iter().find(|a| *a == pk || Some(*a) == sk) {
                return Err(Error::InvalidQuery(format!(
                    "filter on key attribute '{}', use a key condition instead",
                    key
                )));
            }
        }

        check_projection(shape, &self.projection)?;
        check_limit(self.limit)?;
        if let Some(cursor) = &self.cursor {
            cursor.check_shape(&shape.name)?;
        }

        let mut writer = ExpressionWriter::new();
        let mut key_condition = writer.condition(&partition);
        if let Some(sort) = &sort {
            key_condition = format!("{} AND {}", key_condition, writer.condition(sort));
        }
        let filter = writer.conjunction(&self.filters);
        let projection = (!self.projection.is_empty()).then(|| writer.projection(&self.projection));
        let (names, values) = writer.finish();

        let mut plan = RequestPlan::new(&shape.name, &shape.table, Operation::Query { key_condition });
        plan.filter = filter;
        plan.projection = projection;
        plan.names = names;
        plan.values = values;
        plan.index = self.index.clone();
        plan.consistency = self.consistency;
        plan.limit = self.limit;
        plan.cursor = self.cursor.clone();
        plan.forward = self.forward;
        Ok(plan)
    }

    /// Sort all key predicates into exactly one partition equality and at
    /// most one sort key condition.
    fn key_clauses(&self, pk: &str, sk: Option<&str>) -> Result<(Condition, Option<Condition>)> {
        let mut partition: Option<Condition> = self.partition.clone().map(|value| Condition::Compare {
            attribute: pk.to_string(),
            op: Comparator::Eq,
            value,
        });
        let mut sort: Option<Condition> = match (&self.sort, sk) {
            (Some(cond), Some(sk)) => Some(cond.clone().on(sk)),
            (Some(_), None) => {
                return Err(Error::InvalidQuery(format!(
                    "sort key condition on '{}' which has no sort key",
                    self.target()
                )))
            }
            (None, _) => None,
        };

        let mut flat = Vec::new();
        for condition in &self.key_conditions {
            flatten_and(condition, &mut flat)?;
        }

        for condition in flat {
            let attribute = condition.attributes().first().map(|a| a.to_string()).unwrap_or_default();
            if attribute == pk {
                if !matches!(condition, Condition::Compare { op: Comparator::Eq, .. }) {
                    return Err(Error::InvalidQuery(format!(
                        "partition key '{}' only supports equality",
                        pk
                    )));
                }
                if partition.replace(condition).is_some() {
                    return Err(Error::InvalidQuery(format!(
                        "more than one condition on partition key '{}'",
                        pk
                    )));
                }
            } else if Some(attribute.as_str()) == sk {
                let supported = matches!(
                    condition,
                    Condition::Compare { op, .. } if op != Comparator::Ne
                ) || matches!(
                    condition,
                    Condition::Between { .. } | Condition::BeginsWith { .. }
                );
                if !supported {
                    return Err(Error::InvalidQuery(format!(
                        "unsupported condition on sort key '{}'",
                        attribute
                    )));
                }
                if sort.replace(condition).is_some() {
                    return Err(Error::InvalidQuery(format!(
                        "more than one condition on sort key '{}'",
                        attribute
                    )));
                }
            } else {
                return Err(Error::InvalidQuery(format!(
                    "'{}' is not a key attribute of {}, use a filter",
                    attribute,
                    self.target()
                )));
            }
        }

        let partition = partition.ok_or_else(|| {
            Error::MissingKeyCondition(format!(
                "query on {} needs an equality condition on partition key '{}'",
                self.target(),
                pk
            ))
        })?;
        Ok((partition, sort))
    }

    fn target(&self) -> String {
        match &self.index {
            Some(index) => format!("index '{}' of '{}'", index, self.shape.name),
            None => format!("'{}'", self.shape.name),
        }
    }
}

fn flatten_and(condition: &Condition, out: &mut Vec<Condition>) -> Result<()> {
    match condition {
        Condition::And(a, b) => {
            flatten_and(a, out)?;
            flatten_and(b, out)
        }
        Condition::Or(..) | Condition::Not(..) => Err(Error::InvalidQuery(
            "key conditions can only be combined with AND".to_string(),
        )),
        other => {
            out.push(other.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::attr;
    use crate::fixtures::{orders, Order};
    use std::collections::HashMap;

    #[test]
    fn test_query_builder() {
        let plan = orders()
            .query()
            .partition("A1")
            .sk_begins_with("2024-")
            .filter(Order::TOTAL.gt(100))
            .limit(10)
            .reverse()
            .build()
            .unwrap();

        assert_eq!(
            plan.operation,
            Operation::Query {
                key_condition: "#n0 = :v0 AND begins_with(#n1, :v1)".to_string()
            }
        );
        assert_eq!(plan.filter.as_deref(), Some("#n2 > :v2"));
        assert_eq!(plan.names["#n0"], "orderId");
        assert_eq!(plan.names["#n1"], "createdAt");
        assert_eq!(plan.names["#n2"], "total");
        assert_eq!(plan.values[":v0"], AttributeValue::string("A1"));
        assert_eq!(plan.limit, Some(10));
        assert!(!plan.forward);
    }

    #[test]
    fn test_query_typed_key_conditions() {
        let typed = orders()
            .query()
            .key(Order::ORDER_ID.eq("A1").and(Order::CREATED_AT.between("2024-01", "2024-06")))
            .build()
            .unwrap();
        let fluent = orders()
            .query()
            .partition("A1")
            .sk_between("2024-01", "2024-06")
            .build()
            .unwrap();
        assert_eq!(typed, fluent);
    }

    #[test]
    fn test_query_without_key_condition() {
        let result = orders().query().filter(Order::TOTAL.gt(5)).build();
        assert!(matches!(result, Err(Error::MissingKeyCondition(_))));

        let result = orders().query().sk_eq("2024").build();
        assert!(matches!(result, Err(Error::MissingKeyCondition(_))));
    }

    #[test]
    fn test_query_misuse() {
        let q = orders().query().partition("A1");

        let filter_on_key = q.clone().filter(Order::CREATED_AT.eq("x")).build();
        assert!(matches!(filter_on_key, Err(Error::InvalidQuery(_))));

        let unknown_index = q.clone().index("nope").build();
        assert!(matches!(unknown_index, Err(Error::InvalidQuery(_))));

        let or_key = orders()
            .query()
            .key(Order::ORDER_ID.eq("A1").or(Order::ORDER_ID.eq("A2")))
            .build();
        assert!(matches!(or_key, Err(Error::InvalidQuery(_))));

        let range_on_partition = orders().query().key(Order::ORDER_ID.gt("A1")).build();
        assert!(matches!(range_on_partition, Err(Error::InvalidQuery(_))));

        let non_key = orders().query().partition("A1").key(Order::TOTAL.eq(3)).build();
        assert!(matches!(non_key, Err(Error::InvalidQuery(_))));

        assert!(matches!(q.clone().limit(0).build(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_query_type_checks() {
        let wrong_partition = orders().query().partition(42).build();
        assert!(matches!(wrong_partition, Err(Error::TypeMismatch { .. })));

        let wrong_filter = orders()
            .query()
            .partition("A1")
            .filter(attr("total").eq("lots"))
            .build();
        assert!(matches!(wrong_filter, Err(Error::TypeMismatch { .. })));

        let unknown = orders().query().partition("A1").filter(attr("colour").eq("red")).build();
        assert!(matches!(unknown, Err(Error::UnknownAttribute { .. })));
    }

    #[test]
    fn test_query_index() {
        let plan = orders()
            .query()
            .index("byCustomer")
            .partition("C9")
            .sk_gte("2024-01-01")
            .filter(Order::ORDER_ID.begins_with("A"))
            .build()
            .unwrap();
        assert_eq!(plan.index.as_deref(), Some("byCustomer"));
        assert_eq!(plan.names["#n0"], "customerId");
        // the table's key is an ordinary attribute on this index
        assert_eq!(plan.names["#n2"], "orderId");

        let strong_gsi = orders()
            .query()
            .index("byCustomer")
            .partition("C9")
            .consistent_read()
            .build();
        assert!(matches!(strong_gsi, Err(Error::InvalidQuery(_))));

        let strong_lsi = orders()
            .query()
            .index("byTotal")
            .partition("A1")
            .sk_gt(10)
            .consistent_read()
            .build();
        assert!(strong_lsi.is_ok());
    }

    #[test]
    fn test_query_cursor() {
        let cursor = PageCursor::new(
            "Order",
            HashMap::from([("orderId".to_string(), AttributeValue::string("A1"))]),
        );
        let plan = orders()
            .query()
            .partition("A1")
            .start_from_token(&cursor.token())
            .build()
            .unwrap();
        assert_eq!(plan.cursor, Some(cursor));

        let foreign = PageCursor::new("Customer", HashMap::new());
        let result = orders().query().partition("A1").start_from(foreign).build();
        assert!(matches!(result, Err(Error::InvalidCursor(_))));

        let garbage = orders().query().partition("A1").start_from_token("!!").build();
        assert!(matches!(garbage, Err(Error::InvalidCursor(_))));
    }

    #[test]
    fn test_builder_values_are_independent() {
        let base = orders().query().partition("A1");
        let narrowed = base.clone().sk_eq("2024-01-01");
        assert_ne!(base.build().unwrap(), narrowed.build().unwrap());
        assert_eq!(base.build().unwrap(), base.build().unwrap());
    }
}
