use dynaq_core::schema::{IndexKind, KeyRole};
use dynaq_core::{AttributeKind, Error, MetamodelRegistry, Shape};
use dynaq_test_utils::fixtures::{Customer, Order};
use std::sync::Arc;
use std::thread;

#[test]
fn test_registered_shape_describes_keys_and_indexes() {
    let registry = MetamodelRegistry::new();
    let orders = registry.register_shape::<Order>().unwrap();
    let descriptor = orders.descriptor();

    assert_eq!(descriptor.table, "orders");
    assert_eq!(descriptor.partition_key, "orderId");
    assert_eq!(descriptor.sort_key.as_deref(), Some("createdAt"));

    let by_customer = descriptor.index("byCustomer").unwrap();
    assert_eq!(by_customer.kind, IndexKind::Global);
    assert_eq!(by_customer.partition_key, "customerId");
    assert_eq!(by_customer.sort_key.as_deref(), Some("createdAt"));

    let by_total = descriptor.index("byTotal").unwrap();
    assert_eq!(by_total.kind, IndexKind::Local);
    assert_eq!(by_total.partition_key, "orderId");

    let total = descriptor.attribute("total").unwrap();
    assert_eq!(total.kind, AttributeKind::Number);
    assert_eq!(total.role, KeyRole::None);
    assert!(descriptor.attribute("coupon").unwrap().nullable);
    assert!(descriptor.attribute("note").unwrap().optional);
}

#[test]
fn test_rename_and_skip() {
    let registry = MetamodelRegistry::new();
    let customers = registry.register_shape::<Customer>().unwrap();
    let descriptor = customers.descriptor();

    assert!(descriptor.attribute("mail").is_some());
    assert!(descriptor.attribute("email").is_none());
    assert!(descriptor.attribute("session").is_none());
    assert_eq!(Customer::declaration().attributes.len(), 4);
}

#[test]
fn test_lookup_by_name_and_type() {
    let registry = MetamodelRegistry::new();
    registry.register_shape::<Order>().unwrap();
    registry.register_shape::<Customer>().unwrap();
    registry.seal();

    assert_eq!(registry.shapes(), vec!["Customer".to_string(), "Order".to_string()]);
    assert_eq!(registry.lookup("Order").unwrap().descriptor.table, "orders");
    assert!(registry.table::<Customer>().is_ok());
    assert!(matches!(registry.lookup("Invoice"), Err(Error::ShapeNotFound(_))));
    assert!(matches!(registry.register_shape::<Order>(), Err(Error::RegistryClosed(_))));
}

#[test]
fn test_concurrent_readers_see_one_registry() {
    let registry = Arc::new(MetamodelRegistry::new());
    registry.register_shape::<Order>().unwrap();
    registry.seal();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let orders = registry.table::<Order>().unwrap();
                    assert_eq!(orders.descriptor().partition_key, "orderId");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_compilation_is_deterministic() {
    use dynaq_core::{Document, SchemaCompiler};
    use dynaq_test_utils::fixtures::order;

    let first = SchemaCompiler::compile(Order::declaration()).unwrap();
    let second = SchemaCompiler::compile(Order::declaration()).unwrap();
    assert_eq!(first, second);

    let results = SchemaCompiler::compile_all(&[Order::declaration(), Customer::declaration()]);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), &first);

    let record = order("A1", "2024-01-01", 5);
    assert_eq!(record.to_item(), record.to_item());
}
