/// Condition and update expressions for DynamoDB-style requests
///
/// Builders collect typed [`Condition`] and [`UpdateAction`] values; the
/// [`ExpressionWriter`] renders them into store expression strings where
/// every attribute name goes through a `#nK` placeholder and every value
/// through a `:vK` placeholder.
///
/// ```ignore
/// let cond = Order::TOTAL.gt(100).and(Order::STATUS.eq("open"));
///
/// let mut writer = ExpressionWriter::new();
/// let text = writer.condition(&cond);   // "(#n0 > :v0) AND (#n1 = :v1)"
/// let (names, values) = writer.finish();
/// ```
use crate::error::{Error, Result};
use crate::number::Number;
use crate::schema::{AttributeDescriptor, ShapeDescriptor};
use crate::types::{AttributeKind, AttributeValue, WireType};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Most values the store accepts in one IN list
pub const MAX_IN_VALUES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }

    fn is_ordering(&self) -> bool {
        !matches!(self, Comparator::Eq | Comparator::Ne)
    }
}

/// Filter / condition predicate AST
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        attribute: String,
        op: Comparator,
        value: AttributeValue,
    },
    Between {
        attribute: String,
        low: AttributeValue,
        high: AttributeValue,
    },
    In {
        attribute: String,
        values: Vec<AttributeValue>,
    },
    BeginsWith {
        attribute: String,
        prefix: AttributeValue,
    },
    Contains {
        attribute: String,
        value: AttributeValue,
    },
    Exists(String),
    NotExists(String),
    AttributeType {
        attribute: String,
        wire_type: WireType,
    },

    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }

    /// Attribute names referenced anywhere in the predicate, in order
    pub fn attributes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_attributes(&mut out);
        out
    }

    fn collect_attributes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Compare { attribute, .. }
            | Condition::Between { attribute, .. }
            | Condition::In { attribute, .. }
            | Condition::BeginsWith { attribute, .. }
            | Condition::Contains { attribute, .. }
            | Condition::AttributeType { attribute, .. }
            | Condition::Exists(attribute)
            | Condition::NotExists(attribute) => out.push(attribute),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.collect_attributes(out);
                b.collect_attributes(out);
            }
            Condition::Not(inner) => inner.collect_attributes(out),
        }
    }

    /// Check every attribute and value against the shape's descriptor.
    pub fn validate(&self, shape: &ShapeDescriptor) -> Result<()> {
        match self {
            Condition::Compare {
                attribute,
                op,
                value,
            } => {
                let attr = shape.require_attribute(attribute)?;
                if op.is_ordering() {
                    require_ordered(attr)?;
                }
                check_operand(attr, value)
            }
            Condition::Between {
                attribute,
                low,
                high,
            } => {
                let attr = shape.require_attribute(attribute)?;
                require_ordered(attr)?;
                check_operand(attr, low)?;
                check_operand(attr, high)
            }
            Condition::In { attribute, values } => {
                let attr = shape.require_attribute(attribute)?;
                if values.is_empty() {
                    return Err(Error::InvalidQuery(format!(
                        "IN on '{}' needs at least one value",
                        attribute
                    )));
                }
                if values.len() > MAX_IN_VALUES {
                    return Err(Error::InvalidQuery(format!(
                        "IN on '{}' accepts at most {} values",
                        attribute, MAX_IN_VALUES
                    )));
                }
                values.iter().try_for_each(|v| check_operand(attr, v))
            }
            Condition::BeginsWith { attribute, prefix } => {
                let attr = shape.require_attribute(attribute)?;
                match attr.kind {
                    AttributeKind::String | AttributeKind::Binary => check_operand(attr, prefix),
                    _ => Err(Error::InvalidQuery(format!(
                        "begins_with needs a string or binary attribute, '{}' is {}",
                        attribute, attr.kind
                    ))),
                }
            }
            Condition::Contains { attribute, value } => {
                let attr = shape.require_attribute(attribute)?;
                let element = match &attr.kind {
                    AttributeKind::String => AttributeKind::String,
                    AttributeKind::Binary => AttributeKind::Binary,
                    kind => kind.element().ok_or_else(|| {
                        Error::InvalidQuery(format!(
                            "contains needs a string, set or list attribute, '{}' is {}",
                            attribute, kind
                        ))
                    })?,
                };
                if element.matches(value) {
                    Ok(())
                } else {
                    Err(Error::type_mismatch(attribute.as_str(), element, value.wire_type()))
                }
            }
            Condition::Exists(attribute)
            | Condition::NotExists(attribute)
            | Condition::AttributeType { attribute, .. } => {
                shape.require_attribute(attribute).map(|_| ())
            }
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.validate(shape)?;
                b.validate(shape)
            }
            Condition::Not(inner) => inner.validate(shape),
        }
    }
}

fn require_ordered(attr: &AttributeDescriptor) -> Result<()> {
    if attr.kind.is_key_scalar() {
        Ok(())
    } else {
        Err(Error::InvalidQuery(format!(
            "ordering comparison on '{}' which is {}",
            attr.name, attr.kind
        )))
    }
}

fn check_operand(attr: &AttributeDescriptor, value: &AttributeValue) -> Result<()> {
    if attr.kind.matches(value) || (value.is_null() && attr.nullable) {
        Ok(())
    } else {
        Err(Error::type_mismatch(attr.name.as_str(), &attr.kind, value.wire_type()))
    }
}

/// Untyped attribute reference, for predicates built from names.
/// Values are type-checked when the request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr(String);

/// Start a predicate on the named attribute
pub fn attr(name: impl Into<String>) -> Attr {
    Attr(name.into())
}

impl Attr {
    pub fn name(&self) -> &str {
        &self.0
    }

    fn compare(&self, op: Comparator, value: impl Into<AttributeValue>) -> Condition {
        Condition::Compare {
            attribute: self.0.clone(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparator::Eq, value)
    }

    pub fn ne(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparator::Ne, value)
    }

    pub fn lt(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparator::Lt, value)
    }

    pub fn le(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparator::Le, value)
    }

    pub fn gt(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparator::Gt, value)
    }

    pub fn ge(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparator::Ge, value)
    }

    pub fn between(&self, low: impl Into<AttributeValue>, high: impl Into<AttributeValue>) -> Condition {
        Condition::Between {
            attribute: self.0.clone(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn is_in<V: Into<AttributeValue>>(&self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::In {
            attribute: self.0.clone(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn begins_with(&self, prefix: impl Into<AttributeValue>) -> Condition {
        Condition::BeginsWith {
            attribute: self.0.clone(),
            prefix: prefix.into(),
        }
    }

    pub fn contains(&self, value: impl Into<AttributeValue>) -> Condition {
        Condition::Contains {
            attribute: self.0.clone(),
            value: value.into(),
        }
    }

    pub fn exists(&self) -> Condition {
        Condition::Exists(self.0.clone())
    }

    pub fn not_exists(&self) -> Condition {
        Condition::NotExists(self.0.clone())
    }

    pub fn is_type(&self, wire_type: WireType) -> Condition {
        Condition::AttributeType {
            attribute: self.0.clone(),
            wire_type,
        }
    }

    pub fn is_null(&self) -> Condition {
        self.is_type(WireType::Null)
    }

    pub fn is_not_null(&self) -> Condition {
        self.is_null().not()
    }
}

/// One action of an update request
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// SET #a = :v
    Set { attribute: String, value: AttributeValue },
    /// REMOVE #a
    Remove(String),
    /// SET #a = #a + :v
    Increment { attribute: String, by: Number },
    /// SET #a = #a - :v
    Decrement { attribute: String, by: Number },
    /// ADD #a :v (number or set)
    Add { attribute: String, value: AttributeValue },
    /// DELETE #a :v (set)
    Delete { attribute: String, value: AttributeValue },
    /// SET #a = list_append(#a, :v)
    Append { attribute: String, values: AttributeValue },
}

impl UpdateAction {
    pub fn attribute(&self) -> &str {
        match self {
            UpdateAction::Set { attribute, .. }
            | UpdateAction::Increment { attribute, .. }
            | UpdateAction::Decrement { attribute, .. }
            | UpdateAction::Add { attribute, .. }
            | UpdateAction::Delete { attribute, .. }
            | UpdateAction::Append { attribute, .. }
            | UpdateAction::Remove(attribute) => attribute,
        }
    }

    pub fn validate(&self, shape: &ShapeDescriptor) -> Result<()> {
        let name = self.attribute();
        let attr = shape.require_attribute(name)?;
        if shape.is_table_key(name) {
            return Err(Error::InvalidQuery(format!(
                "key attribute '{}' cannot be updated",
                name
            )));
        }

        match self {
            UpdateAction::Set { value, .. } => {
                if value.is_null() {
                    if attr.nullable {
                        Ok(())
                    } else {
                        Err(Error::InvalidQuery(format!(
                            "'{}' is not nullable, use remove for optional attributes",
                            name
                        )))
                    }
                } else {
                    check_operand(attr, value)
                }
            }
            UpdateAction::Remove(_) => {
                if attr.optional || attr.nullable {
                    Ok(())
                } else {
                    Err(Error::InvalidQuery(format!(
                        "required attribute '{}' cannot be removed",
                        name
                    )))
                }
            }
            UpdateAction::Increment { .. } | UpdateAction::Decrement { .. } => {
                if attr.kind == AttributeKind::Number {
                    Ok(())
                } else {
                    Err(Error::type_mismatch(name, AttributeKind::Number, &attr.kind))
                }
            }
            UpdateAction::Add { value, .. } => match attr.kind {
                AttributeKind::Number | AttributeKind::StringSet | AttributeKind::NumberSet | AttributeKind::BinarySet => {
                    check_operand(attr, value)
                }
                _ => Err(Error::InvalidQuery(format!(
                    "ADD needs a number or set attribute, '{}' is {}",
                    name, attr.kind
                ))),
            },
            UpdateAction::Delete { value, .. } => {
                if attr.kind.is_set() {
                    check_operand(attr, value)
                } else {
                    Err(Error::InvalidQuery(format!(
                        "DELETE needs a set attribute, '{}' is {}",
                        name, attr.kind
                    )))
                }
            }
            UpdateAction::Append { values, .. } => match attr.kind {
                AttributeKind::List(_) => check_operand(attr, values),
                _ => Err(Error::InvalidQuery(format!(
                    "append needs a list attribute, '{}' is {}",
                    name, attr.kind
                ))),
            },
        }
    }
}

/// Validate a whole update: non-empty, each action valid, no attribute
/// touched twice.
pub fn validate_updates(actions: &[UpdateAction], shape: &ShapeDescriptor) -> Result<()> {
    if actions.is_empty() {
        return Err(Error::InvalidQuery("update has no actions".to_string()));
    }
    let mut seen = HashSet::new();
    for action in actions {
        action.validate(shape)?;
        if !seen.insert(action.attribute()) {
            return Err(Error::InvalidQuery(format!(
                "attribute '{}' is updated more than once",
                action.attribute()
            )));
        }
    }
    Ok(())
}

/// Renders conditions, updates and projections with placeholders.
///
/// Placeholders are handed out in call order, so the same sequence of calls
/// always produces the same text and maps. A name referenced twice reuses
/// its placeholder; values never do.
#[derive(Debug, Default)]
pub struct ExpressionWriter {
    names: BTreeMap<String, String>,
    name_lookup: HashMap<String, String>,
    values: BTreeMap<String, AttributeValue>,
}

impl ExpressionWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.name_lookup.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        self.name_lookup.insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    pub fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    pub fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare {
                attribute,
                op,
                value,
            } => {
                let n = self.name(attribute);
                let v = self.value(value.clone());
                format!("{} {} {}", n, op.symbol(), v)
            }
            Condition::Between {
                attribute,
                low,
                high,
            } => {
                let n = self.name(attribute);
                let lo = self.value(low.clone());
                let hi = self.value(high.clone());
                format!("{} BETWEEN {} AND {}", n, lo, hi)
            }
            Condition::In { attribute, values } => {
                let n = self.name(attribute);
                let list: Vec<String> = values.iter().map(|v| self.value(v.clone())).collect();
                format!("{} IN ({})", n, list.join(", "))
            }
            Condition::BeginsWith { attribute, prefix } => {
                let n = self.name(attribute);
                let v = self.value(prefix.clone());
                format!("begins_with({}, {})", n, v)
            }
            Condition::Contains { attribute, value } => {
                let n = self.name(attribute);
                let v = self.value(value.clone());
                format!("contains({}, {})", n, v)
            }
            Condition::Exists(attribute) => format!("attribute_exists({})", self.name(attribute)),
            Condition::NotExists(attribute) => {
                format!("attribute_not_exists({})", self.name(attribute))
            }
            Condition::AttributeType {
                attribute,
                wire_type,
            } => {
                let n = self.name(attribute);
                let v = self.value(AttributeValue::string(wire_type.tag()));
                format!("attribute_type({}, {})", n, v)
            }
            Condition::And(a, b) => {
                let left = self.condition(a);
                let right = self.condition(b);
                format!("({}) AND ({})", left, right)
            }
            Condition::Or(a, b) => {
                let left = self.condition(a);
                let right = self.condition(b);
                format!("({}) OR ({})", left, right)
            }
            Condition::Not(inner) => format!("NOT ({})", self.condition(inner)),
        }
    }

    /// Conjunction of several conditions, without extra parentheses for one
    pub fn conjunction(&mut self, conditions: &[Condition]) -> Option<String> {
        match conditions {
            [] => None,
            [single] => Some(self.condition(single)),
            many => {
                let parts: Vec<String> = many
                    .iter()
                    .map(|c| format!("({})", self.condition(c)))
                    .collect();
                Some(parts.join(" AND "))
            }
        }
    }

    pub fn update(&mut self, actions: &[UpdateAction]) -> String {
        let mut set = Vec::new();
        let mut remove = Vec::new();
        let mut add = Vec::new();
        let mut delete = Vec::new();

        for action in actions {
            match action {
                UpdateAction::Set { attribute, value } => {
                    let n = self.name(attribute);
                    let v = self.value(value.clone());
                    set.push(format!("{} = {}", n, v));
                }
                UpdateAction::Increment { attribute, by } => {
                    let n = self.name(attribute);
                    let v = self.value(AttributeValue::N(by.clone()));
                    set.push(format!("{} = {} + {}", n, n, v));
                }
                UpdateAction::Decrement { attribute, by } => {
                    let n = self.name(attribute);
                    let v = self.value(AttributeValue::N(by.clone()));
                    set.push(format!("{} = {} - {}", n, n, v));
                }
                UpdateAction::Append { attribute, values } => {
                    let n = self.name(attribute);
                    let v = self.value(values.clone());
                    set.push(format!("{} = list_append({}, {})", n, n, v));
                }
                UpdateAction::Remove(attribute) => remove.push(self.name(attribute)),
                UpdateAction::Add { attribute, value } => {
                    let n = self.name(attribute);
                    let v = self.value(value.clone());
                    add.push(format!("{} {}", n, v));
                }
                UpdateAction::Delete { attribute, value } => {
                    let n = self.name(attribute);
                    let v = self.value(value.clone());
                    delete.push(format!("{} {}", n, v));
                }
            }
        }

        let mut clauses = Vec::new();
        for (keyword, parts) in [("SET", set), ("REMOVE", remove), ("ADD", add), ("DELETE", delete)] {
            if !parts.is_empty() {
                clauses.push(format!("{} {}", keyword, parts.join(", ")));
            }
        }
        clauses.join(" ")
    }

    pub fn projection(&mut self, attributes: &[String]) -> String {
        attributes
            .iter()
            .map(|a| self.name(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn finish(self) -> (BTreeMap<String, String>, BTreeMap<String, AttributeValue>) {
        (self.names, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexDescriptor, IndexKind, KeyRole};

    fn descriptor() -> ShapeDescriptor {
        let attr = |name: &str, kind: AttributeKind, role: KeyRole, optional: bool, nullable: bool| {
            AttributeDescriptor {
                name: name.to_string(),
                kind,
                optional,
                nullable,
                role,
            }
        };
        ShapeDescriptor {
            name: "Order".into(),
            table: "orders".into(),
            attributes: vec![
                attr("orderId", AttributeKind::String, KeyRole::Partition, false, false),
                attr("createdAt", AttributeKind::String, KeyRole::Sort, false, false),
                attr("total", AttributeKind::Number, KeyRole::None, false, false),
                attr("tags", AttributeKind::StringSet, KeyRole::None, true, false),
                attr("notes", AttributeKind::List(Box::new(AttributeKind::String)), KeyRole::None, false, false),
                attr("coupon", AttributeKind::String, KeyRole::None, true, true),
                attr("paid", AttributeKind::Boolean, KeyRole::None, false, false),
            ],
            partition_key: "orderId".into(),
            sort_key: Some("createdAt".into()),
            indexes: vec![IndexDescriptor {
                name: "byTotal".into(),
                kind: IndexKind::Local,
                partition_key: "orderId".into(),
                sort_key: Some("total".into()),
            }],
        }
    }

    #[test]
    fn test_render_comparison() {
        let mut w = ExpressionWriter::new();
        let text = w.condition(&attr("total").gt(100));
        assert_eq!(text, "#n0 > :v0");
        let (names, values) = w.finish();
        assert_eq!(names.get("#n0").map(String::as_str), Some("total"));
        assert_eq!(values.get(":v0"), Some(&AttributeValue::number(100)));
    }

    #[test]
    fn test_render_composite() {
        let cond = attr("total")
            .between(1, 10)
            .and(attr("tags").contains("vip").or(attr("coupon").is_null().not()));
        let mut w = ExpressionWriter::new();
        assert_eq!(
            w.condition(&cond),
            "(#n0 BETWEEN :v0 AND :v1) AND ((contains(#n1, :v2)) OR (NOT (attribute_type(#n2, :v3))))"
        );
        let (_, values) = w.finish();
        assert_eq!(values[":v3"], AttributeValue::string("NULL"));
    }

    #[test]
    fn test_names_are_reused_values_are_not() {
        let cond = attr("total").gt(1).and(attr("total").lt(5));
        let mut w = ExpressionWriter::new();
        assert_eq!(w.condition(&cond), "(#n0 > :v0) AND (#n0 < :v1)");
        let (names, values) = w.finish();
        assert_eq!(names.len(), 1);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_render_in_and_reserved_word() {
        // "status" and "name" are reserved words, always hidden behind placeholders
        let cond = attr("name").is_in(["a", "b"]);
        let mut w = ExpressionWriter::new();
        assert_eq!(w.condition(&cond), "#n0 IN (:v0, :v1)");
    }

    #[test]
    fn test_render_update() {
        let actions = vec![
            UpdateAction::Set {
                attribute: "paid".into(),
                value: AttributeValue::Bool(true),
            },
            UpdateAction::Remove("coupon".into()),
            UpdateAction::Increment {
                attribute: "total".into(),
                by: Number::from(5),
            },
            UpdateAction::Add {
                attribute: "tags".into(),
                value: AttributeValue::Ss(vec!["new".into()]),
            },
            UpdateAction::Append {
                attribute: "notes".into(),
                values: AttributeValue::L(vec![AttributeValue::string("hi")]),
            },
        ];
        let mut w = ExpressionWriter::new();
        assert_eq!(
            w.update(&actions),
            "SET #n0 = :v0, #n2 = #n2 + :v1, #n4 = list_append(#n4, :v3) REMOVE #n1 ADD #n3 :v2"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let cond = attr("total").ge(3).or(attr("paid").eq(true));
        let render = || {
            let mut w = ExpressionWriter::new();
            let text = w.condition(&cond);
            (text, w.finish())
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_validate_unknown_attribute() {
        match attr("missing").eq("x").validate(&descriptor()) {
            Err(Error::UnknownAttribute { shape, attribute }) => {
                assert_eq!(shape, "Order");
                assert_eq!(attribute, "missing");
            }
            other => panic!("Expected UnknownAttribute, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_type_mismatch() {
        match attr("total").eq("ten").validate(&descriptor()) {
            Err(Error::TypeMismatch {
                attribute,
                expected,
                found,
            }) => {
                assert_eq!(attribute, "total");
                assert_eq!(expected, "number");
                assert_eq!(found, "string");
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }

        assert!(matches!(
            attr("tags").contains(3).validate(&descriptor()),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(attr("tags").contains("vip").validate(&descriptor()).is_ok());
        assert!(attr("notes").contains("x").validate(&descriptor()).is_ok());
    }

    #[test]
    fn test_validate_misuse() {
        let shape = descriptor();
        assert!(matches!(attr("paid").gt(true).validate(&shape), Err(Error::InvalidQuery(_))));
        assert!(matches!(attr("total").begins_with(1).validate(&shape), Err(Error::InvalidQuery(_))));
        assert!(matches!(
            attr("total").is_in(Vec::<i32>::new()).validate(&shape),
            Err(Error::InvalidQuery(_))
        ));
        assert!(attr("coupon").eq(AttributeValue::Null).validate(&shape).is_ok());
    }

    #[test]
    fn test_validate_updates() {
        let shape = descriptor();
        assert!(matches!(validate_updates(&[], &shape), Err(Error::InvalidQuery(_))));

        let set_key = [UpdateAction::Set {
            attribute: "orderId".into(),
            value: AttributeValue::string("x"),
        }];
        assert!(matches!(validate_updates(&set_key, &shape), Err(Error::InvalidQuery(_))));

        let null_required = [UpdateAction::Set {
            attribute: "total".into(),
            value: AttributeValue::Null,
        }];
        assert!(matches!(validate_updates(&null_required, &shape), Err(Error::InvalidQuery(_))));

        let null_nullable = [UpdateAction::Set {
            attribute: "coupon".into(),
            value: AttributeValue::Null,
        }];
        assert!(validate_updates(&null_nullable, &shape).is_ok());

        let increment_string = [UpdateAction::Increment {
            attribute: "coupon".into(),
            by: Number::from(1),
        }];
        assert!(matches!(
            validate_updates(&increment_string, &shape),
            Err(Error::TypeMismatch { .. })
        ));

        let twice = [
            UpdateAction::Remove("coupon".into()),
            UpdateAction::Set {
                attribute: "coupon".into(),
                value: AttributeValue::string("x"),
            },
        ];
        assert!(matches!(validate_updates(&twice, &shape), Err(Error::InvalidQuery(_))));

        let remove_required = [UpdateAction::Remove("total".into())];
        assert!(matches!(validate_updates(&remove_required, &shape), Err(Error::InvalidQuery(_))));
    }
}
