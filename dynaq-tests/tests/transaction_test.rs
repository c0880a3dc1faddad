use dynaq_api::{Executor, ExecutorConfig, StoreError, StoreResponse, TransactOutcome};
use dynaq_core::{Document, Error, Operation, Table, Transaction};
use dynaq_test_utils::fixtures::{customer, customers, order, orders, Customer, Order};
use dynaq_test_utils::{memory_executor, quick_retry, ScriptedClient};

fn tables() -> (Table<Order>, Table<Customer>) {
    (orders(), customers())
}

#[tokio::test]
async fn test_transaction_commits_across_tables() {
    let (orders, customers) = tables();
    let (store, executor) = memory_executor(&[orders.descriptor().as_ref(), customers.descriptor().as_ref()]).unwrap();
    store.insert("customers", customer("C1", "Ada").to_item());

    let mut placed = order("A1", "2024-01-01", 30);
    placed.customer_id = "C1".into();
    let plan = Transaction::new()
        .put(orders.put(&placed).if_not_exists())
        .update(customers.update("C1").increment(Customer::VISITS, 1).if_exists())
        .build()
        .unwrap();

    let outcome = executor.transact_write(&plan).await.unwrap();
    assert!(outcome.is_committed());
    assert_eq!(store.request_count(), 1);
    assert_eq!(store.item_count("orders"), 1);

    let stored = Customer::from_item(&store.items("customers")[0]).unwrap();
    assert_eq!(stored.visits, 1);
}

#[tokio::test]
async fn test_failed_condition_cancels_every_write() {
    let (orders, customers) = tables();
    let (store, executor) = memory_executor(&[orders.descriptor().as_ref(), customers.descriptor().as_ref()]).unwrap();

    // The customer does not exist, so the guarded update fails and the order is not written.
    let plan = Transaction::new()
        .put(orders.put(&order("A1", "2024-01-01", 30)))
        .update(customers.update("C1").increment(Customer::VISITS, 1).if_exists())
        .build()
        .unwrap();

    let outcome = executor.transact_write(&plan).await.unwrap();
    assert_eq!(
        outcome,
        TransactOutcome::Canceled {
            reasons: vec![None, Some("ConditionalCheckFailed".to_string())]
        }
    );
    assert_eq!(store.item_count("orders"), 0);
    assert_eq!(store.item_count("customers"), 0);
    // A canceled transaction is an outcome, not a retryable failure
    assert_eq!(store.request_count(), 1);
}

#[tokio::test]
async fn test_throttled_transaction_is_resent_with_its_token() {
    let client = ScriptedClient::new().throttle(2).reply(StoreResponse::default());
    let executor = Executor::with_config(client, ExecutorConfig::new().with_retry(quick_retry(3))).unwrap();

    let plan = Transaction::new()
        .put(orders().put(&order("A1", "2024-01-01", 1)))
        .client_request_token("checkout-A1")
        .build()
        .unwrap();
    assert!(executor.transact_write(&plan).await.unwrap().is_committed());

    let calls = executor.client().calls();
    assert_eq!(calls.len(), 3);
    for call in &calls {
        match &call.operation {
            Operation::TransactWrite { client_token, writes } => {
                assert_eq!(client_token.as_deref(), Some("checkout-A1"));
                assert_eq!(writes.len(), 1);
            }
            other => panic!("Expected TransactWrite, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_transaction_service_error_passes_through() {
    let client = ScriptedClient::new().fail(StoreError::Service("ValidationException: bad".into()));
    let executor = Executor::new(client);

    let plan = Transaction::new()
        .delete(orders().delete(("A1", "2024-01-01")))
        .build()
        .unwrap();
    let result = executor.transact_write(&plan).await;
    assert_eq!(result, Err(Error::Service("ValidationException: bad".into())));
    assert_eq!(executor.client().call_count(), 1);
}
