use dynaq_core::{AttributeValue, Document, Error, ReturnValues};
use dynaq_test_utils::fixtures::{order, Address, Order};
use dynaq_test_utils::single_table;
use std::collections::HashSet;

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let (orders, _store, executor) = single_table::<Order>().unwrap();
    let mut o = order("A1", "2024-01-01", 42);
    o.tags = HashSet::from(["gift".to_string(), "rush".to_string()]);
    o.history = vec!["created".into()];
    o.shipping = Some(Address {
        street: "1 Main St".into(),
        city: "Springfield".into(),
    });

    assert!(executor.write(&orders.put(&o).build().unwrap()).await.unwrap().is_written());
    let found = executor
        .get::<Order>(&orders.get(("A1", "2024-01-01")).build().unwrap())
        .await
        .unwrap();
    assert_eq!(found, Some(o));
}

#[tokio::test]
async fn test_get_missing_item() {
    let (orders, _store, executor) = single_table::<Order>().unwrap();
    let plan = orders.get(("nope", "2024-01-01")).consistent_read().build().unwrap();
    assert_eq!(executor.get::<Order>(&plan).await.unwrap(), None);
}

#[tokio::test]
async fn test_conditional_put_against_memory_store() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    let plan = orders.put(&order("A1", "2024-01-01", 1)).if_not_exists().build().unwrap();

    assert!(executor.write(&plan).await.unwrap().is_written());
    let second = executor.write(&plan).await.unwrap();
    assert!(!second.is_written());
    assert_eq!(store.request_count(), 2);
}

#[tokio::test]
async fn test_update_returns_new_image() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    let mut o = order("A1", "2024-01-01", 10);
    o.history = vec!["created".into()];
    store.insert("orders", o.to_item());

    let plan = orders
        .update(("A1", "2024-01-01"))
        .increment(Order::TOTAL, 5)
        .append(Order::HISTORY, vec!["paid".to_string()])
        .add(Order::TAGS, HashSet::from(["c".to_string()]))
        .set(Order::NOTE, "leave at door")
        .set_null(Order::COUPON)
        .condition(Order::TOTAL.ge(10))
        .return_values(ReturnValues::AllNew)
        .build()
        .unwrap();

    let outcome = executor.write(&plan).await.unwrap();
    let updated: Order = outcome.decode().unwrap().unwrap();
    assert_eq!(updated.total, 15);
    assert_eq!(updated.history, vec!["created".to_string(), "paid".to_string()]);
    assert!(updated.tags.contains("c"));
    assert_eq!(updated.note.as_deref(), Some("leave at door"));
    assert_eq!(updated.coupon, None);

    let stored = &store.items("orders")[0];
    assert_eq!(stored["coupon"], AttributeValue::Null);
}

#[tokio::test]
async fn test_update_condition_failure() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    store.insert("orders", order("A1", "2024-01-01", 3).to_item());

    let plan = orders
        .update(("A1", "2024-01-01"))
        .decrement(Order::TOTAL, 5)
        .condition(Order::TOTAL.ge(5))
        .build()
        .unwrap();
    let outcome = executor.write(&plan).await.unwrap();
    assert!(!outcome.is_written());
    assert_eq!(Order::from_item(&store.items("orders")[0]).unwrap().total, 3);
}

#[tokio::test]
async fn test_update_if_exists_does_not_upsert() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    let plan = orders
        .update(("A1", "2024-01-01"))
        .set(Order::NOTE, "x")
        .if_exists()
        .build()
        .unwrap();
    assert!(!executor.write(&plan).await.unwrap().is_written());
    assert_eq!(store.item_count("orders"), 0);
}

#[tokio::test]
async fn test_delete_returns_old_item() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    let o = order("A1", "2024-01-01", 3);
    store.insert("orders", o.to_item());

    let plan = orders
        .delete_item(&o)
        .return_values(ReturnValues::AllOld)
        .build()
        .unwrap();
    let outcome = executor.write(&plan).await.unwrap();
    assert_eq!(outcome.decode::<Order>().unwrap(), Some(o));
    assert_eq!(store.item_count("orders"), 0);
}

#[tokio::test]
async fn test_write_all_keeps_input_order() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    store.insert("orders", order("A2", "2024-01-01", 1).to_item());

    let plans: Vec<_> = (1..=4)
        .map(|i| {
            orders
                .put(&order(&format!("A{}", i), "2024-01-01", i))
                .if_not_exists()
                .build()
                .unwrap()
        })
        .collect();
    let outcomes = executor.write_all(plans).await;
    let written: Vec<bool> = outcomes.iter().map(|r| r.as_ref().unwrap().is_written()).collect();
    assert_eq!(written, vec![true, false, true, true]);
    assert_eq!(store.item_count("orders"), 4);
}

#[tokio::test]
async fn test_write_rejects_read_plan() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    let plan = orders.get(("A1", "2024-01-01")).build().unwrap();
    assert!(matches!(executor.write(&plan).await, Err(Error::InvalidArgument(_))));
    assert_eq!(store.request_count(), 0);
}
