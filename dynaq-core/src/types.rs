use crate::number::Number;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Store attribute value in wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireValue", try_from = "WireValue")]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number (decimal text)
    N(Number),
    /// Binary
    B(Bytes),
    /// Boolean
    Bool(bool),
    /// Null
    Null,
    /// String set
    Ss(Vec<String>),
    /// Number set
    Ns(Vec<Number>),
    /// Binary set
    Bs(Vec<Bytes>),
    /// List
    L(Vec<AttributeValue>),
    /// Map
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::S(s.into())
    }

    pub fn number(n: impl Into<Number>) -> Self {
        AttributeValue::N(n.into())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        AttributeValue::B(b.into())
    }

    pub fn map(m: HashMap<String, AttributeValue>) -> Self {
        AttributeValue::M(m)
    }

    pub fn list(l: Vec<AttributeValue>) -> Self {
        AttributeValue::L(l)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            AttributeValue::B(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<AttributeValue>> {
        match self {
            AttributeValue::L(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            AttributeValue::M(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            AttributeValue::S(_) => WireType::S,
            AttributeValue::N(_) => WireType::N,
            AttributeValue::B(_) => WireType::B,
            AttributeValue::Bool(_) => WireType::Bool,
            AttributeValue::Null => WireType::Null,
            AttributeValue::Ss(_) => WireType::Ss,
            AttributeValue::Ns(_) => WireType::Ns,
            AttributeValue::Bs(_) => WireType::Bs,
            AttributeValue::L(_) => WireType::L,
            AttributeValue::M(_) => WireType::M,
        }
    }
}

macro_rules! attribute_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for AttributeValue {
                fn from(v: $t) -> Self {
                    AttributeValue::$variant(v.into())
                }
            }
        )*
    };
}

attribute_value_from!(
    String => S,
    &str => S,
    Number => N,
    Bytes => B,
    bool => Bool,
    i8 => N, i16 => N, i32 => N, i64 => N, i128 => N, isize => N,
    u8 => N, u16 => N, u32 => N, u64 => N, u128 => N, usize => N,
);

impl From<uuid::Uuid> for AttributeValue {
    fn from(v: uuid::Uuid) -> Self {
        AttributeValue::S(v.to_string())
    }
}

/// Item - a map of attribute names to values
pub type Item = HashMap<String, AttributeValue>;

/// Wire tag of an attribute value, as named by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    S,
    N,
    B,
    #[serde(rename = "BOOL")]
    Bool,
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "SS")]
    Ss,
    #[serde(rename = "NS")]
    Ns,
    #[serde(rename = "BS")]
    Bs,
    L,
    M,
}

impl WireType {
    /// The store's tag for this type (`"S"`, `"BOOL"`, `"SS"`, ...)
    pub fn tag(&self) -> &'static str {
        match self {
            WireType::S => "S",
            WireType::N => "N",
            WireType::B => "B",
            WireType::Bool => "BOOL",
            WireType::Null => "NULL",
            WireType::Ss => "SS",
            WireType::Ns => "NS",
            WireType::Bs => "BS",
            WireType::L => "L",
            WireType::M => "M",
        }
    }

    pub fn from_tag(tag: &str) -> Option<WireType> {
        Some(match tag {
            "S" => WireType::S,
            "N" => WireType::N,
            "B" => WireType::B,
            "BOOL" => WireType::Bool,
            "NULL" => WireType::Null,
            "SS" => WireType::Ss,
            "NS" => WireType::Ns,
            "BS" => WireType::Bs,
            "L" => WireType::L,
            "M" => WireType::M,
            _ => return None,
        })
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::S => "string",
            WireType::N => "number",
            WireType::B => "binary",
            WireType::Bool => "boolean",
            WireType::Null => "null",
            WireType::Ss => "string set",
            WireType::Ns => "number set",
            WireType::Bs => "binary set",
            WireType::L => "list",
            WireType::M => "map",
        };
        f.write_str(name)
    }
}

/// Semantic type of a declared attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    String,
    Number,
    Binary,
    Boolean,
    StringSet,
    NumberSet,
    BinarySet,
    List(Box<AttributeKind>),
    Map(Box<AttributeKind>),
    /// Nested document, named by its Rust type
    Document(String),
}

impl AttributeKind {
    /// Key attributes (table or index) must be one of these
    pub fn is_key_scalar(&self) -> bool {
        matches!(
            self,
            AttributeKind::String | AttributeKind::Number | AttributeKind::Binary
        )
    }

    pub fn is_set(&self) -> bool {
        matches!(
            self,
            AttributeKind::StringSet | AttributeKind::NumberSet | AttributeKind::BinarySet
        )
    }

    /// Element kind of a set or list
    pub fn element(&self) -> Option<AttributeKind> {
        match self {
            AttributeKind::StringSet => Some(AttributeKind::String),
            AttributeKind::NumberSet => Some(AttributeKind::Number),
            AttributeKind::BinarySet => Some(AttributeKind::Binary),
            AttributeKind::List(inner) => Some((**inner).clone()),
            _ => None,
        }
    }

    /// Check whether a wire value has the shape of this kind.
    /// List elements may be null; map and document contents are checked by tag only.
    pub fn matches(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (AttributeKind::String, AttributeValue::S(_)) => true,
            (AttributeKind::Number, AttributeValue::N(_)) => true,
            (AttributeKind::Binary, AttributeValue::B(_)) => true,
            (AttributeKind::Boolean, AttributeValue::Bool(_)) => true,
            (AttributeKind::StringSet, AttributeValue::Ss(s)) => !s.is_empty(),
            (AttributeKind::NumberSet, AttributeValue::Ns(s)) => !s.is_empty(),
            (AttributeKind::BinarySet, AttributeValue::Bs(s)) => !s.is_empty(),
            (AttributeKind::List(inner), AttributeValue::L(items)) => items
                .iter()
                .all(|v| v.is_null() || inner.matches(v)),
            (AttributeKind::Map(inner), AttributeValue::M(entries)) => entries
                .values()
                .all(|v| v.is_null() || inner.matches(v)),
            (AttributeKind::Document(_), AttributeValue::M(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::String => f.write_str("string"),
            AttributeKind::Number => f.write_str("number"),
            AttributeKind::Binary => f.write_str("binary"),
            AttributeKind::Boolean => f.write_str("boolean"),
            AttributeKind::StringSet => f.write_str("string set"),
            AttributeKind::NumberSet => f.write_str("number set"),
            AttributeKind::BinarySet => f.write_str("binary set"),
            AttributeKind::List(inner) => write!(f, "list<{}>", inner),
            AttributeKind::Map(inner) => write!(f, "map<{}>", inner),
            AttributeKind::Document(name) => write!(f, "document {}", name),
        }
    }
}

/// Primary key values: partition key plus optional sort key
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    pub partition: AttributeValue,
    pub sort: Option<AttributeValue>,
}

impl PrimaryKey {
    pub fn new(partition: impl Into<AttributeValue>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    pub fn with_sort(partition: impl Into<AttributeValue>, sort: impl Into<AttributeValue>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

macro_rules! primary_key_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for PrimaryKey {
                fn from(v: $t) -> Self {
                    PrimaryKey::new(v)
                }
            }
        )*
    };
}

primary_key_from!(
    AttributeValue, String, &str, Number, Bytes, uuid::Uuid,
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
);

impl<A: Into<AttributeValue>, B: Into<AttributeValue>> From<(A, B)> for PrimaryKey {
    fn from((partition, sort): (A, B)) -> Self {
        PrimaryKey::with_sort(partition, sort)
    }
}

// Serde goes through the store's JSON wire form: {"S": "x"}, {"NULL": true},
// binary as base64.

#[derive(Clone, Serialize, Deserialize)]
enum WireValue {
    S(String),
    N(Number),
    B(#[serde(with = "base64_bytes")] Bytes),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<Number>),
    #[serde(rename = "BS")]
    Bs(#[serde(with = "base64_bytes_list")] Vec<Bytes>),
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
}

impl From<AttributeValue> for WireValue {
    fn from(v: AttributeValue) -> Self {
        match v {
            AttributeValue::S(s) => WireValue::S(s),
            AttributeValue::N(n) => WireValue::N(n),
            AttributeValue::B(b) => WireValue::B(b),
            AttributeValue::Bool(b) => WireValue::Bool(b),
            AttributeValue::Null => WireValue::Null(true),
            AttributeValue::Ss(s) => WireValue::Ss(s),
            AttributeValue::Ns(s) => WireValue::Ns(s),
            AttributeValue::Bs(s) => WireValue::Bs(s),
            AttributeValue::L(l) => WireValue::L(l),
            AttributeValue::M(m) => WireValue::M(m),
        }
    }
}

impl TryFrom<WireValue> for AttributeValue {
    type Error = String;

    fn try_from(v: WireValue) -> std::result::Result<Self, String> {
        Ok(match v {
            WireValue::S(s) => AttributeValue::S(s),
            WireValue::N(n) => AttributeValue::N(n),
            WireValue::B(b) => AttributeValue::B(b),
            WireValue::Bool(b) => AttributeValue::Bool(b),
            WireValue::Null(true) => AttributeValue::Null,
            WireValue::Null(false) => return Err("NULL must be true".to_string()),
            WireValue::Ss(s) => AttributeValue::Ss(s),
            WireValue::Ns(s) => AttributeValue::Ns(s),
            WireValue::Bs(s) => AttributeValue::Bs(s),
            WireValue::L(l) => AttributeValue::L(l),
            WireValue::M(m) => AttributeValue::M(m),
        })
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(b: &Bytes, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(b))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Bytes, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_list {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(list: &[Bytes], s: S) -> std::result::Result<S::Ok, S::Error> {
        let encoded: Vec<String> = list.iter().map(|b| STANDARD.encode(b)).collect();
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<Bytes>, D::Error> {
        let texts = Vec::<String>::deserialize(d)?;
        texts
            .iter()
            .map(|t| {
                STANDARD
                    .decode(t.as_bytes())
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
