//! Mapper traits implemented by the derives, typed field handles and the
//! type-erased mapper kept by the registry.

use crate::codec::AttributeCodec;
use crate::error::{Error, Result};
use crate::expression::{Comparator, Condition};
use crate::schema::{ShapeDeclaration, ShapeDescriptor};
use crate::types::{AttributeValue, Item, WireType};
use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Conversion between a typed record and an attribute map.
///
/// Generated by `#[derive(Document)]` and `#[derive(Shape)]`: each field is
/// encoded and decoded through its [`AttributeCodec`] under a literal
/// attribute name.
pub trait Document: Sized {
    fn to_item(&self) -> Item;

    fn from_item(item: &Item) -> Result<Self>;
}

/// A top-level record stored in a table.
pub trait Shape: Document + Send + Sync + 'static {
    fn declaration() -> &'static ShapeDeclaration;
}

/// Typed handle to one attribute of shape `S` holding values of type `T`.
///
/// For optional fields `T` is the inner type, so `Order::COUPON.eq("X")`
/// works on an `Option<String>` field.
pub struct Field<S, T> {
    name: &'static str,
    _marker: PhantomData<fn() -> (S, T)>,
}

impl<S, T> Clone for Field<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> Copy for Field<S, T> {}

impl<S, T> fmt::Debug for Field<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

impl<S, T> Field<S, T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn exists(&self) -> Condition {
        Condition::Exists(self.name.to_string())
    }

    pub fn not_exists(&self) -> Condition {
        Condition::NotExists(self.name.to_string())
    }

    pub fn is_type(&self, wire_type: WireType) -> Condition {
        Condition::AttributeType {
            attribute: self.name.to_string(),
            wire_type,
        }
    }

    pub fn is_null(&self) -> Condition {
        self.is_type(WireType::Null)
    }

    pub fn is_not_null(&self) -> Condition {
        self.is_null().not()
    }

    /// Collection membership. The element is checked against the
    /// attribute's element type when the request is built.
    pub fn contains<V: AttributeCodec>(&self, element: V) -> Condition {
        Condition::Contains {
            attribute: self.name.to_string(),
            value: encode_operand(&element),
        }
    }
}

fn encode_operand<T: AttributeCodec>(value: &T) -> AttributeValue {
    value.encode().unwrap_or(AttributeValue::Null)
}

impl<S, T: AttributeCodec> Field<S, T> {
    fn compare(&self, op: Comparator, value: impl Into<T>) -> Condition {
        Condition::Compare {
            attribute: self.name.to_string(),
            op,
            value: encode_operand(&value.into()),
        }
    }

    pub fn eq(&self, value: impl Into<T>) -> Condition {
        self.compare(Comparator::Eq, value)
    }

    pub fn ne(&self, value: impl Into<T>) -> Condition {
        self.compare(Comparator::Ne, value)
    }

    pub fn lt(&self, value: impl Into<T>) -> Condition {
        self.compare(Comparator::Lt, value)
    }

    pub fn le(&self, value: impl Into<T>) -> Condition {
        self.compare(Comparator::Le, value)
    }

    pub fn gt(&self, value: impl Into<T>) -> Condition {
        self.compare(Comparator::Gt, value)
    }

    pub fn ge(&self, value: impl Into<T>) -> Condition {
        self.compare(Comparator::Ge, value)
    }

    pub fn between(&self, low: impl Into<T>, high: impl Into<T>) -> Condition {
        Condition::Between {
            attribute: self.name.to_string(),
            low: encode_operand(&low.into()),
            high: encode_operand(&high.into()),
        }
    }

    pub fn is_in<V: Into<T>>(&self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::In {
            attribute: self.name.to_string(),
            values: values
                .into_iter()
                .map(|v| encode_operand(&v.into()))
                .collect(),
        }
    }

    pub fn begins_with(&self, prefix: impl Into<T>) -> Condition {
        Condition::BeginsWith {
            attribute: self.name.to_string(),
            prefix: encode_operand(&prefix.into()),
        }
    }

    /// Encode a value of this attribute's type
    pub fn value(&self, value: impl Into<T>) -> AttributeValue {
        encode_operand(&value.into())
    }
}

/// Type-erased handle to a generated mapper.
///
/// The registry stores one per shape; two mappers are the same mapper when
/// they map the same Rust type.
#[derive(Clone, Copy)]
pub struct Mapper {
    type_id: TypeId,
    type_name: &'static str,
}

impl Mapper {
    pub fn of<D: Document + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<D>(),
            type_name: type_name::<D>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn maps<D: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<D>()
    }

    fn check<D: 'static>(&self) -> Result<()> {
        if self.maps::<D>() {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "mapper for {} cannot map {}",
                self.type_name,
                type_name::<D>()
            )))
        }
    }

    pub fn encode<D: Document + 'static>(&self, value: &D) -> Result<Item> {
        self.check::<D>()?;
        Ok(value.to_item())
    }

    pub fn decode<D: Document + 'static>(&self, item: &Item) -> Result<D> {
        self.check::<D>()?;
        D::from_item(item)
    }
}

impl PartialEq for Mapper {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Mapper {}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Descriptor plus mapper, shared read-only once registered
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShape {
    pub descriptor: Arc<ShapeDescriptor>,
    pub mapper: Mapper,
}

impl CompiledShape {
    pub fn new(descriptor: ShapeDescriptor, mapper: Mapper) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            mapper,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}
