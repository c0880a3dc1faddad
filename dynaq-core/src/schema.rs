//! Shape declarations and the schema compiler.
//!
//! `#[derive(Shape)]` emits a `'static` [`ShapeDeclaration`]. The
//! [`SchemaCompiler`] validates a declaration and turns it into an owned
//! [`ShapeDescriptor`], which is what the registry, builders and engine use.

use crate::error::{Error, Result};
use crate::types::AttributeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Key role of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    None,
    Partition,
    Sort,
}

/// Secondary index type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// Shares the table partition key, alternative sort key
    Local,
    /// Independent partition and sort keys, eventually consistent only
    Global,
}

/// Static attribute declaration, as emitted by the derive
#[derive(Debug, Clone, Copy)]
pub struct AttributeDeclaration {
    /// Stored attribute name
    pub name: &'static str,
    /// Semantic type, taken from the field type's codec
    pub kind: fn() -> AttributeKind,
    pub optional: bool,
    pub nullable: bool,
    pub role: KeyRole,
}

/// Static secondary index declaration
#[derive(Debug, Clone, Copy)]
pub struct IndexDeclaration {
    pub name: &'static str,
    pub kind: IndexKind,
    /// Partition attribute. Local indexes use the table's partition key.
    pub partition: Option<&'static str>,
    pub sort: Option<&'static str>,
}

/// Static shape declaration, as emitted by the derive
#[derive(Debug, Clone, Copy)]
pub struct ShapeDeclaration {
    pub name: &'static str,
    pub table: &'static str,
    pub attributes: &'static [AttributeDeclaration],
    pub indexes: &'static [IndexDeclaration],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    pub optional: bool,
    pub nullable: bool,
    pub role: KeyRole,
}

impl AttributeDescriptor {
    pub fn is_key(&self) -> bool {
        self.role != KeyRole::None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: IndexKind,
    pub partition_key: String,
    pub sort_key: Option<String>,
}

/// Compiled metamodel of one shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    pub name: String,
    pub table: String,
    /// Declaration order
    pub attributes: Vec<AttributeDescriptor>,
    pub partition_key: String,
    pub sort_key: Option<String>,
    pub indexes: Vec<IndexDescriptor>,
}

impl ShapeDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up an attribute or fail with `UnknownAttribute`
    pub fn require_attribute(&self, name: &str) -> Result<&AttributeDescriptor> {
        self.attribute(name).ok_or_else(|| Error::UnknownAttribute {
            shape: self.name.clone(),
            attribute: name.to_string(),
        })
    }

    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Partition and sort key names for the table or one of its indexes
    pub fn key_schema(&self, index: Option<&str>) -> Result<(&str, Option<&str>)> {
        match index {
            None => Ok((self.partition_key.as_str(), self.sort_key.as_deref())),
            Some(name) => {
                let index = self.index(name).ok_or_else(|| {
                    Error::InvalidQuery(format!("unknown index '{}' on shape '{}'", name, self.name))
                })?;
                Ok((index.partition_key.as_str(), index.sort_key.as_deref()))
            }
        }
    }

    /// True if `name` is part of the table's primary key
    pub fn is_table_key(&self, name: &str) -> bool {
        self.partition_key == name || self.sort_key.as_deref() == Some(name)
    }
}

/// Validates declarations and builds descriptors.
pub struct SchemaCompiler;

impl SchemaCompiler {
    /// Compile one declaration. Pure and deterministic: the same declaration
    /// always yields an equal descriptor.
    pub fn compile(decl: &ShapeDeclaration) -> Result<ShapeDescriptor> {
        match Self::build(decl) {
            Ok(descriptor) => {
                debug!(
                    shape = decl.name,
                    table = decl.table,
                    attributes = descriptor.attributes.len(),
                    indexes = descriptor.indexes.len(),
                    "Compiled shape"
                );
                Ok(descriptor)
            }
            Err(e) => {
                warn!(shape = decl.name, error = %e, "Rejected shape declaration");
                Err(e)
            }
        }
    }

    /// Compile independent declarations in parallel. Results are returned in
    /// input order, one per declaration; a failing shape does not affect the
    /// others.
    pub fn compile_all(decls: &[&ShapeDeclaration]) -> Vec<Result<ShapeDescriptor>> {
        if decls.len() <= 1 {
            return decls.iter().map(|d| Self::compile(d)).collect();
        }

        let mut results: Vec<Option<Result<ShapeDescriptor>>> = vec![None; decls.len()];
        let scoped = crossbeam::thread::scope(|scope| {
            for (slot, decl) in results.iter_mut().zip(decls.iter()) {
                scope.spawn(move |_| {
                    *slot = Some(Self::compile(decl));
                });
            }
        });

        if scoped.is_err() {
            // A compile thread panicked; fall back to compiling in place.
            return decls.iter().map(|d| Self::compile(d)).collect();
        }

        results
            .into_iter()
            .zip(decls.iter())
            .map(|(result, decl)| result.unwrap_or_else(|| Self::compile(decl)))
            .collect()
    }

    fn build(decl: &ShapeDeclaration) -> Result<ShapeDescriptor> {
        let shape = decl.name;
        if decl.table.is_empty() {
            return Err(Error::schema(shape, "table name must not be empty"));
        }

        let mut seen = HashSet::new();
        let mut attributes = Vec::with_capacity(decl.attributes.len());
        let mut partition_key: Option<&str> = None;
        let mut sort_key: Option<&str> = None;

        for attr in decl.attributes {
            if attr.name.is_empty() {
                return Err(Error::schema(shape, "attribute name must not be empty"));
            }
            if !seen.insert(attr.name) {
                return Err(Error::schema(
                    shape,
                    format!("duplicate attribute name '{}'", attr.name),
                ));
            }

            let kind = (attr.kind)();
            match attr.role {
                KeyRole::Partition => {
                    if let Some(existing) = partition_key {
                        return Err(Error::schema(
                            shape,
                            format!(
                                "more than one partition key ('{}' and '{}')",
                                existing, attr.name
                            ),
                        ));
                    }
                    Self::check_key_attribute(shape, attr, &kind)?;
                    partition_key = Some(attr.name);
                }
                KeyRole::Sort => {
                    if let Some(existing) = sort_key {
                        return Err(Error::schema(
                            shape,
                            format!("more than one sort key ('{}' and '{}')", existing, attr.name),
                        ));
                    }
                    Self::check_key_attribute(shape, attr, &kind)?;
                    sort_key = Some(attr.name);
                }
                KeyRole::None => {}
            }

            attributes.push(AttributeDescriptor {
                name: attr.name.to_string(),
                kind,
                optional: attr.optional,
                nullable: attr.nullable,
                role: attr.role,
            });
        }

        let partition_key = partition_key
            .ok_or_else(|| Error::schema(shape, "missing partition key"))?
            .to_string();

        let mut indexes = Vec::with_capacity(decl.indexes.len());
        let mut index_names = HashSet::new();
        for index in decl.indexes {
            if !index_names.insert(index.name) {
                return Err(Error::schema(
                    shape,
                    format!("duplicate index name '{}'", index.name),
                ));
            }
            indexes.push(Self::build_index(shape, index, &partition_key, &attributes)?);
        }

        Ok(ShapeDescriptor {
            name: shape.to_string(),
            table: decl.table.to_string(),
            attributes,
            partition_key,
            sort_key: sort_key.map(str::to_string),
            indexes,
        })
    }

    fn check_key_attribute(shape: &str, attr: &AttributeDeclaration, kind: &AttributeKind) -> Result<()> {
        if !kind.is_key_scalar() {
            return Err(Error::schema(
                shape,
                format!(
                    "key attribute '{}' must be a string, number or binary, found {}",
                    attr.name, kind
                ),
            ));
        }
        if attr.optional || attr.nullable {
            return Err(Error::schema(
                shape,
                format!("key attribute '{}' must not be optional or nullable", attr.name),
            ));
        }
        Ok(())
    }

    fn build_index(
        shape: &str,
        index: &IndexDeclaration,
        table_partition: &str,
        attributes: &[AttributeDescriptor],
    ) -> Result<IndexDescriptor> {
        let partition_key = match (index.kind, index.partition) {
            (IndexKind::Global, Some(p)) => p.to_string(),
            (IndexKind::Global, None) => {
                return Err(Error::schema(
                    shape,
                    format!("global index '{}' has no partition attribute", index.name),
                ))
            }
            (IndexKind::Local, None) => table_partition.to_string(),
            (IndexKind::Local, Some(p)) if p == table_partition => p.to_string(),
            (IndexKind::Local, Some(p)) => {
                return Err(Error::schema(
                    shape,
                    format!(
                        "local index '{}' must use the table partition key, not '{}'",
                        index.name, p
                    ),
                ))
            }
        };

        if index.kind == IndexKind::Local && index.sort.is_none() {
            return Err(Error::schema(
                shape,
                format!("local index '{}' has no sort attribute", index.name),
            ));
        }

        for key in std::iter::once(partition_key.as_str()).chain(index.sort) {
            let attr = attributes.iter().find(|a| a.name == key).ok_or_else(|| {
                Error::schema(
                    shape,
                    format!("index '{}' references undeclared attribute '{}'", index.name, key),
                )
            })?;
            if !attr.kind.is_key_scalar() {
                return Err(Error::schema(
                    shape,
                    format!(
                        "index '{}' key attribute '{}' must be a string, number or binary",
                        index.name, key
                    ),
                ));
            }
        }

        if index.sort == Some(partition_key.as_str()) {
            return Err(Error::schema(
                shape,
                format!("index '{}' uses '{}' as both partition and sort key", index.name, partition_key),
            ));
        }

        Ok(IndexDescriptor {
            name: index.name.to_string(),
            kind: index.kind,
            partition_key,
            sort_key: index.sort.map(str::to_string),
        })
    }
}
