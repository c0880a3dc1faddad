//! Attribute codec: conversion between Rust values and wire attribute values.
//!
//! Every field type that can appear on a declared shape implements
//! [`AttributeCodec`]. Generated mappers call these impls with literal
//! attribute names; nothing here inspects types at runtime.

use crate::error::{Error, Result};
use crate::number::Number;
use crate::types::{AttributeKind, AttributeValue};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use uuid::Uuid;

/// Encode/decode between a Rust type and a wire attribute value.
pub trait AttributeCodec: Sized {
    /// Whether the attribute may be absent from an item.
    const OPTIONAL: bool = false;

    /// Semantic type reported to the schema compiler.
    fn kind() -> AttributeKind;

    /// Encode to a wire value. `None` means "write no entry".
    fn encode(&self) -> Option<AttributeValue>;

    fn decode(value: &AttributeValue) -> Result<Self>;

    /// Value to use when the attribute is missing from the item.
    fn decode_absent() -> Result<Self> {
        Err(Error::MalformedAttribute("missing required attribute".to_string()))
    }
}

/// Scalar types allowed as partition or sort keys.
pub trait KeyAttribute: AttributeCodec {}

/// Element types that can be stored in a string, number or binary set.
pub trait SetElement: AttributeCodec {
    fn set_kind() -> AttributeKind;

    fn encode_set<'a, I>(elements: I) -> AttributeValue
    where
        I: Iterator<Item = &'a Self>,
        Self: 'a;

    fn decode_set(value: &AttributeValue) -> Result<Vec<Self>>;
}

fn mismatch(expected: AttributeKind, value: &AttributeValue) -> Error {
    Error::type_mismatch("", expected, value.wire_type())
}

impl AttributeCodec for String {
    fn kind() -> AttributeKind {
        AttributeKind::String
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::S(self.clone()))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::S(s) => Ok(s.clone()),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

impl AttributeCodec for Number {
    fn kind() -> AttributeKind {
        AttributeKind::Number
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::N(self.clone()))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::N(n) => Ok(n.clone()),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

impl AttributeCodec for Bytes {
    fn kind() -> AttributeKind {
        AttributeKind::Binary
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::B(self.clone()))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::B(b) => Ok(b.clone()),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

impl AttributeCodec for bool {
    fn kind() -> AttributeKind {
        AttributeKind::Boolean
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::Bool(*self))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Bool(b) => Ok(*b),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

macro_rules! integer_codec {
    ($($t:ty),*) => {
        $(
            impl AttributeCodec for $t {
                fn kind() -> AttributeKind {
                    AttributeKind::Number
                }

                fn encode(&self) -> Option<AttributeValue> {
                    Some(AttributeValue::N(Number::from(*self)))
                }

                fn decode(value: &AttributeValue) -> Result<Self> {
                    match value {
                        AttributeValue::N(n) => n.to_integer::<$t>(),
                        other => Err(mismatch(Self::kind(), other)),
                    }
                }
            }

            impl KeyAttribute for $t {}

            impl SetElement for $t {
                fn set_kind() -> AttributeKind {
                    AttributeKind::NumberSet
                }

                fn encode_set<'a, I>(elements: I) -> AttributeValue
                where
                    I: Iterator<Item = &'a Self>,
                {
                    AttributeValue::Ns(elements.map(|n| Number::from(*n)).collect())
                }

                fn decode_set(value: &AttributeValue) -> Result<Vec<Self>> {
                    match value {
                        AttributeValue::Ns(items) => {
                            non_empty(items)?;
                            items.iter().map(|n| n.to_integer::<$t>()).collect()
                        }
                        other => Err(mismatch(Self::set_kind(), other)),
                    }
                }
            }
        )*
    };
}

integer_codec!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl KeyAttribute for String {}
impl KeyAttribute for Number {}
impl KeyAttribute for Bytes {}
impl KeyAttribute for Uuid {}
impl KeyAttribute for DateTime<Utc> {}
impl KeyAttribute for NaiveDate {}

fn non_empty<T>(items: &[T]) -> Result<()> {
    if items.is_empty() {
        Err(Error::MalformedAttribute("set must not be empty".to_string()))
    } else {
        Ok(())
    }
}

impl SetElement for String {
    fn set_kind() -> AttributeKind {
        AttributeKind::StringSet
    }

    fn encode_set<'a, I>(elements: I) -> AttributeValue
    where
        I: Iterator<Item = &'a Self>,
    {
        AttributeValue::Ss(elements.cloned().collect())
    }

    fn decode_set(value: &AttributeValue) -> Result<Vec<Self>> {
        match value {
            AttributeValue::Ss(items) => {
                non_empty(items)?;
                Ok(items.clone())
            }
            other => Err(mismatch(Self::set_kind(), other)),
        }
    }
}

impl SetElement for Number {
    fn set_kind() -> AttributeKind {
        AttributeKind::NumberSet
    }

    fn encode_set<'a, I>(elements: I) -> AttributeValue
    where
        I: Iterator<Item = &'a Self>,
    {
        AttributeValue::Ns(elements.cloned().collect())
    }

    fn decode_set(value: &AttributeValue) -> Result<Vec<Self>> {
        match value {
            AttributeValue::Ns(items) => {
                non_empty(items)?;
                Ok(items.clone())
            }
            other => Err(mismatch(Self::set_kind(), other)),
        }
    }
}

impl SetElement for Bytes {
    fn set_kind() -> AttributeKind {
        AttributeKind::BinarySet
    }

    fn encode_set<'a, I>(elements: I) -> AttributeValue
    where
        I: Iterator<Item = &'a Self>,
    {
        AttributeValue::Bs(elements.cloned().collect())
    }

    fn decode_set(value: &AttributeValue) -> Result<Vec<Self>> {
        match value {
            AttributeValue::Bs(items) => {
                non_empty(items)?;
                Ok(items.clone())
            }
            other => Err(mismatch(Self::set_kind(), other)),
        }
    }
}

// Dates and identifiers travel as strings.

impl AttributeCodec for DateTime<Utc> {
    fn kind() -> AttributeKind {
        AttributeKind::String
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::S(self.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::S(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::MalformedAttribute(format!("invalid timestamp '{}': {}", s, e))),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

impl AttributeCodec for NaiveDate {
    fn kind() -> AttributeKind {
        AttributeKind::String
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::S(self.format("%Y-%m-%d").to_string()))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::S(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| Error::MalformedAttribute(format!("invalid date '{}': {}", s, e))),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

impl AttributeCodec for Uuid {
    fn kind() -> AttributeKind {
        AttributeKind::String
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::S(self.to_string()))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::S(s) => Uuid::parse_str(s)
                .map_err(|e| Error::MalformedAttribute(format!("invalid uuid '{}': {}", s, e))),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

// Optional values: absent or NULL both decode to None.
//
// An inner value that encodes to nothing makes the whole option encode to
// nothing. `Some(empty set)` is therefore written as an absent attribute and
// reads back as `None`; use a plain set field when empty and absent should
// be the same value.

impl<T: AttributeCodec> AttributeCodec for Option<T> {
    const OPTIONAL: bool = true;

    fn kind() -> AttributeKind {
        T::kind()
    }

    fn encode(&self) -> Option<AttributeValue> {
        self.as_ref().and_then(|v| v.encode())
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Null => Ok(None),
            other => T::decode(other).map(Some),
        }
    }

    fn decode_absent() -> Result<Self> {
        Ok(None)
    }
}

// Lists and maps.

fn encode_element<T: AttributeCodec>(value: &T) -> AttributeValue {
    value.encode().unwrap_or(AttributeValue::Null)
}

impl<T: AttributeCodec> AttributeCodec for Vec<T> {
    fn kind() -> AttributeKind {
        AttributeKind::List(Box::new(T::kind()))
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::L(self.iter().map(encode_element).collect()))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::L(items) => items.iter().map(T::decode).collect(),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

impl<T: AttributeCodec> AttributeCodec for HashMap<String, T> {
    fn kind() -> AttributeKind {
        AttributeKind::Map(Box::new(T::kind()))
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::M(
            self.iter()
                .map(|(k, v)| (k.clone(), encode_element(v)))
                .collect(),
        ))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::M(entries) => entries
                .iter()
                .map(|(k, v)| T::decode(v).map(|v| (k.clone(), v)))
                .collect(),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

impl<T: AttributeCodec> AttributeCodec for BTreeMap<String, T> {
    fn kind() -> AttributeKind {
        AttributeKind::Map(Box::new(T::kind()))
    }

    fn encode(&self) -> Option<AttributeValue> {
        Some(AttributeValue::M(
            self.iter()
                .map(|(k, v)| (k.clone(), encode_element(v)))
                .collect(),
        ))
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::M(entries) => entries
                .iter()
                .map(|(k, v)| T::decode(v).map(|v| (k.clone(), v)))
                .collect(),
            other => Err(mismatch(Self::kind(), other)),
        }
    }
}

// Sets: empty sets are not representable on the wire, so they are omitted
// and an absent attribute decodes to an empty set.

impl<T: SetElement + Eq + Hash> AttributeCodec for HashSet<T> {
    const OPTIONAL: bool = true;

    fn kind() -> AttributeKind {
        T::set_kind()
    }

    fn encode(&self) -> Option<AttributeValue> {
        if self.is_empty() {
            None
        } else {
            Some(T::encode_set(self.iter()))
        }
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Null => Ok(HashSet::new()),
            other => Ok(T::decode_set(other)?.into_iter().collect()),
        }
    }

    fn decode_absent() -> Result<Self> {
        Ok(HashSet::new())
    }
}

impl<T: SetElement + Ord> AttributeCodec for BTreeSet<T> {
    const OPTIONAL: bool = true;

    fn kind() -> AttributeKind {
        T::set_kind()
    }

    fn encode(&self) -> Option<AttributeValue> {
        if self.is_empty() {
            None
        } else {
            Some(T::encode_set(self.iter()))
        }
    }

    fn decode(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Null => Ok(BTreeSet::new()),
            other => Ok(T::decode_set(other)?.into_iter().collect()),
        }
    }

    fn decode_absent() -> Result<Self> {
        Ok(BTreeSet::new())
    }
}

/// Decode one named attribute from an item, applying absence rules and
/// labelling any type mismatch with the attribute name.
pub fn decode_attribute<T: AttributeCodec>(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Result<T> {
    match item.get(name) {
        Some(value) => T::decode(value).map_err(|e| e.at_attribute(name)),
        None => T::decode_absent().map_err(|e| match e {
            Error::MalformedAttribute(_) => {
                Error::MalformedAttribute(format!("missing required attribute '{}'", name))
            }
            other => other,
        }),
    }
}

/// Encode one named attribute into an item. Absent values are written as an
/// explicit NULL when `nullable` is set and skipped otherwise.
pub fn encode_attribute<T: AttributeCodec>(
    item: &mut HashMap<String, AttributeValue>,
    name: &str,
    value: &T,
    nullable: bool,
) {
    match value.encode() {
        Some(v) => {
            item.insert(name.to_string(), v);
        }
        None if nullable => {
            item.insert(name.to_string(), AttributeValue::Null);
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn roundtrip<T: AttributeCodec + PartialEq + std::fmt::Debug>(value: T) {
        let encoded = value.encode().expect("value should encode");
        assert!(T::kind().matches(&encoded), "{:?} does not match {}", encoded, T::kind());
        assert_eq!(T::decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_scalar_roundtrip() {
        roundtrip("hello".to_string());
        roundtrip(Number::parse("12345678901234567890.123456789").unwrap());
        roundtrip(Bytes::from_static(b"\x00\x01\xff"));
        roundtrip(true);
        roundtrip(-42i32);
        roundtrip(u64::MAX);
        roundtrip(Uuid::new_v4());
        roundtrip(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        roundtrip(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_collection_roundtrip() {
        roundtrip(vec![1i64, 2, 3]);
        roundtrip(vec![Some("a".to_string()), None]);
        roundtrip(HashMap::from([("a".to_string(), 1u8), ("b".to_string(), 2u8)]));
        roundtrip(BTreeMap::from([("k".to_string(), vec![true, false])]));
        roundtrip(HashSet::from(["x".to_string(), "y".to_string()]));
        roundtrip(BTreeSet::from([3i32, 1, 2]));
        roundtrip(BTreeSet::from([Bytes::from_static(b"a")]));
    }

    #[test]
    fn test_option_absent_and_null() {
        assert_eq!(Option::<String>::decode_absent().unwrap(), None);
        assert_eq!(Option::<String>::decode(&AttributeValue::Null).unwrap(), None);
        assert_eq!(None::<String>.encode(), None);
        assert!(<Option<String> as AttributeCodec>::OPTIONAL);
    }

    #[test]
    fn test_optional_empty_set_reads_back_as_none() {
        let value: Option<HashSet<String>> = Some(HashSet::new());
        assert_eq!(value.encode(), None);
        assert_eq!(Option::<HashSet<String>>::decode_absent().unwrap(), None);

        let filled: Option<HashSet<String>> = Some(HashSet::from(["a".to_string()]));
        let encoded = filled.encode().unwrap();
        assert_eq!(Option::<HashSet<String>>::decode(&encoded).unwrap(), filled);
    }

    #[test]
    fn test_required_absent_fails() {
        match String::decode_absent() {
            Err(Error::MalformedAttribute(_)) => {}
            other => panic!("Expected MalformedAttribute, got {:?}", other),
        }

        let item = HashMap::new();
        let err = decode_attribute::<i64>(&item, "total").unwrap_err();
        assert_eq!(err, Error::MalformedAttribute("missing required attribute 'total'".into()));
    }

    #[test]
    fn test_empty_set_omitted() {
        let empty: HashSet<String> = HashSet::new();
        assert_eq!(empty.encode(), None);
        assert_eq!(HashSet::<String>::decode_absent().unwrap(), empty);

        match HashSet::<String>::decode(&AttributeValue::Ss(vec![])) {
            Err(Error::MalformedAttribute(_)) => {}
            other => panic!("Expected MalformedAttribute, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch() {
        let err = decode_attribute::<String>(
            &HashMap::from([("name".to_string(), AttributeValue::number(3))]),
            "name",
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                attribute: "name".into(),
                expected: "string".into(),
                found: "number".into(),
            }
        );
    }

    #[test]
    fn test_malformed_number_into_integer() {
        let value = AttributeValue::N(Number::parse("1.5").unwrap());
        assert!(matches!(i64::decode(&value), Err(Error::MalformedNumber(_))));

        let value = AttributeValue::N(Number::parse("256").unwrap());
        assert!(matches!(u8::decode(&value), Err(Error::MalformedNumber(_))));
    }

    #[test]
    fn test_collection_element_failure_aborts() {
        let value = AttributeValue::L(vec![AttributeValue::number(1), AttributeValue::string("x")]);
        assert!(matches!(Vec::<i32>::decode(&value), Err(Error::TypeMismatch { .. })));

        let value = AttributeValue::Ns(vec![Number::from(1), Number::parse("2.5").unwrap()]);
        assert!(matches!(
            HashSet::<i32>::decode(&value),
            Err(Error::MalformedNumber(_))
        ));
    }

    #[test]
    fn test_encode_attribute_nullable() {
        let mut item = HashMap::new();
        encode_attribute(&mut item, "note", &None::<String>, false);
        assert!(item.is_empty());

        encode_attribute(&mut item, "note", &None::<String>, true);
        assert_eq!(item.get("note"), Some(&AttributeValue::Null));

        encode_attribute(&mut item, "note", &Some("hi".to_string()), true);
        assert_eq!(item.get("note"), Some(&AttributeValue::string("hi")));
    }

    #[test]
    fn test_date_text_form() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(dt.encode(), Some(AttributeValue::string("2024-01-15T10:30:00Z")));
        assert!(matches!(
            NaiveDate::decode(&AttributeValue::string("15/01/2024")),
            Err(Error::MalformedAttribute(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_string_roundtrip(s in ".*") {
            prop_assert_eq!(String::decode(&s.encode().unwrap()).unwrap(), s);
        }

        #[test]
        fn prop_i64_list_roundtrip(v in proptest::collection::vec(any::<i64>(), 0..20)) {
            prop_assert_eq!(Vec::<i64>::decode(&v.encode().unwrap()).unwrap(), v);
        }

        #[test]
        fn prop_optional_u32_roundtrip(v in proptest::option::of(any::<u32>())) {
            let decoded = match v.encode() {
                Some(wire) => Option::<u32>::decode(&wire).unwrap(),
                None => Option::<u32>::decode_absent().unwrap(),
            };
            prop_assert_eq!(decoded, v);
        }

        #[test]
        fn prop_number_set_roundtrip(v in proptest::collection::btree_set(any::<i16>(), 0..10)) {
            let decoded = match v.encode() {
                Some(wire) => BTreeSet::<i16>::decode(&wire).unwrap(),
                None => BTreeSet::<i16>::decode_absent().unwrap(),
            };
            prop_assert_eq!(decoded, v);
        }
    }
}
