//! Metamodel registry
//!
//! Holds one compiled shape (descriptor + mapper) per shape identifier.
//! Shapes are registered while the registry is open; `seal()` publishes an
//! immutable snapshot through a one-time cell, after which registration
//! fails and lookups read the snapshot without taking the lock.

use crate::document::{CompiledShape, Mapper, Shape};
use crate::error::{Error, Result};
use crate::schema::{SchemaCompiler, ShapeDescriptor};
use crate::table::Table;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

/// Process-wide registry, see [`MetamodelRegistry::global`]
static GLOBAL: Lazy<MetamodelRegistry> = Lazy::new(MetamodelRegistry::new);

#[derive(Debug, Default)]
pub struct MetamodelRegistry {
    open: Mutex<HashMap<String, CompiledShape>>,
    sealed: OnceCell<HashMap<String, CompiledShape>>,
}

impl MetamodelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static MetamodelRegistry {
        &GLOBAL
    }

    /// Register a compiled shape.
    ///
    /// Registering the same descriptor with the same mapper again returns the
    /// existing entry. A different definition under the same identifier
    /// fails with `DuplicateShape`.
    pub fn register(&self, descriptor: ShapeDescriptor, mapper: Mapper) -> Result<CompiledShape> {
        let name = descriptor.name.clone();
        if self.sealed.get().is_some() {
            return Err(Error::RegistryClosed(name));
        }

        let mut open = self.open.lock();
        // seal() may have won the race while we waited for the lock
        if self.sealed.get().is_some() {
            return Err(Error::RegistryClosed(name));
        }

        if let Some(existing) = open.get(&name) {
            if *existing.descriptor == descriptor && existing.mapper == mapper {
                debug!(shape = %name, "Shape already registered");
                return Ok(existing.clone());
            }
            return Err(Error::DuplicateShape(name));
        }

        let compiled = CompiledShape::new(descriptor, mapper);
        open.insert(name.clone(), compiled.clone());
        info!(shape = %name, table = %compiled.descriptor.table, "Registered shape");
        Ok(compiled)
    }

    /// Compile a shape's declaration and register it with its generated mapper
    pub fn register_shape<S: Shape>(&self) -> Result<Table<S>> {
        let descriptor = SchemaCompiler::compile(S::declaration())?;
        let compiled = self.register(descriptor, Mapper::of::<S>())?;
        Table::from_compiled(compiled)
    }

    pub fn lookup(&self, name: &str) -> Result<CompiledShape> {
        let found = match self.sealed.get() {
            Some(sealed) => sealed.get(name).cloned(),
            None => self.open.lock().get(name).cloned(),
        };
        found.ok_or_else(|| Error::ShapeNotFound(name.to_string()))
    }

    /// Typed handle for a registered shape
    pub fn table<S: Shape>(&self) -> Result<Table<S>> {
        let compiled = self.lookup(S::declaration().name)?;
        Table::from_compiled(compiled)
    }

    /// Stop accepting registrations. Idempotent.
    pub fn seal(&self) {
        let open = self.open.lock();
        if self.sealed.get().is_some() {
            return;
        }
        let snapshot = open.clone();
        let count = snapshot.len();
        if self.sealed.set(snapshot).is_ok() {
            info!(shapes = count, "Sealed metamodel registry");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    /// Registered shape identifiers, sorted
    pub fn shapes(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.sealed.get() {
            Some(sealed) => sealed.keys().cloned().collect(),
            None => self.open.lock().keys().cloned().collect(),
        };
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_attribute, encode_attribute};
    use crate::document::Document;
    use crate::schema::{AttributeDeclaration, KeyRole, ShapeDeclaration};
    use crate::types::{AttributeKind, Item};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Account {
        id: String,
    }

    fn string() -> AttributeKind {
        AttributeKind::String
    }

    static ACCOUNT_ATTRS: [AttributeDeclaration; 1] = [AttributeDeclaration {
        name: "id",
        kind: string,
        optional: false,
        nullable: false,
        role: KeyRole::Partition,
    }];

    static ACCOUNT: ShapeDeclaration = ShapeDeclaration {
        name: "Account",
        table: "accounts",
        attributes: &ACCOUNT_ATTRS,
        indexes: &[],
    };

    impl Document for Account {
        fn to_item(&self) -> Item {
            let mut item = HashMap::new();
            encode_attribute(&mut item, "id", &self.id, false);
            item
        }

        fn from_item(item: &Item) -> Result<Self> {
            Ok(Account {
                id: decode_attribute(item, "id")?,
            })
        }
    }

    impl Shape for Account {
        fn declaration() -> &'static ShapeDeclaration {
            &ACCOUNT
        }
    }

    #[derive(Debug)]
    struct Impostor;

    impl Document for Impostor {
        fn to_item(&self) -> Item {
            HashMap::new()
        }

        fn from_item(_item: &Item) -> Result<Self> {
            Ok(Impostor)
        }
    }

    fn account_descriptor() -> ShapeDescriptor {
        SchemaCompiler::compile(&ACCOUNT).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = MetamodelRegistry::new();
        registry
            .register(account_descriptor(), Mapper::of::<Account>())
            .unwrap();

        let found = registry.lookup("Account").unwrap();
        assert_eq!(found.descriptor.table, "accounts");
        assert!(found.mapper.maps::<Account>());

        assert!(matches!(registry.lookup("Nope"), Err(Error::ShapeNotFound(_))));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = MetamodelRegistry::new();
        let a = registry
            .register(account_descriptor(), Mapper::of::<Account>())
            .unwrap();
        let b = registry
            .register(account_descriptor(), Mapper::of::<Account>())
            .unwrap();
        assert!(Arc::ptr_eq(&a.descriptor, &b.descriptor));
        assert_eq!(registry.shapes(), vec!["Account".to_string()]);
    }

    #[test]
    fn test_duplicate_shape() {
        let registry = MetamodelRegistry::new();
        registry
            .register(account_descriptor(), Mapper::of::<Account>())
            .unwrap();

        let result = registry.register(account_descriptor(), Mapper::of::<Impostor>());
        assert!(matches!(result, Err(Error::DuplicateShape(_))));

        let mut changed = account_descriptor();
        changed.table = "other".into();
        let result = registry.register(changed, Mapper::of::<Account>());
        assert!(matches!(result, Err(Error::DuplicateShape(_))));
    }

    #[test]
    fn test_seal_closes_registration() {
        let registry = MetamodelRegistry::new();
        registry.register_shape::<Account>().unwrap();
        registry.seal();
        registry.seal();
        assert!(registry.is_sealed());

        let result = registry.register(account_descriptor(), Mapper::of::<Account>());
        assert!(matches!(result, Err(Error::RegistryClosed(_))));

        // lookups stay valid
        assert!(registry.lookup("Account").is_ok());
        let table = registry.table::<Account>().unwrap();
        assert_eq!(table.descriptor().partition_key, "id");
    }

    #[test]
    fn test_concurrent_lookups_after_seal() {
        let registry = MetamodelRegistry::new();
        registry.register_shape::<Account>().unwrap();
        registry.seal();

        crossbeam::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|_| {
                    for _ in 0..100 {
                        assert_eq!(registry.lookup("Account").unwrap().name(), "Account");
                    }
                });
            }
        })
        .unwrap();
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = MetamodelRegistry::global() as *const MetamodelRegistry;
        let b = MetamodelRegistry::global() as *const MetamodelRegistry;
        assert_eq!(a, b);
    }
}
