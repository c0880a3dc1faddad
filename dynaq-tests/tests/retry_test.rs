use dynaq_api::{Executor, ExecutorConfig, StoreError, StoreResponse, WriteOutcome};
use dynaq_core::{Document, Error, Jitter, RetryPolicy};
use dynaq_test_utils::fixtures::{order, orders, Order};
use dynaq_test_utils::{init_tracing, quick_retry, single_table, ScriptedClient};

fn executor(client: ScriptedClient, max_attempts: u32) -> Executor<ScriptedClient> {
    let config = ExecutorConfig::new().with_retry(quick_retry(max_attempts));
    Executor::with_config(client, config).unwrap()
}

#[tokio::test]
async fn test_succeeds_after_throttling() {
    init_tracing();
    let client = ScriptedClient::new()
        .throttle(2)
        .reply(StoreResponse::with_item(Some(order("A1", "2024-01-01", 5).to_item())));
    let executor = executor(client, 3);

    let plan = orders().get(("A1", "2024-01-01")).build().unwrap();
    let found = executor.get::<Order>(&plan).await.unwrap().unwrap();
    assert_eq!(found.total, 5);
    assert_eq!(executor.client().call_count(), 3);
}

#[tokio::test]
async fn test_capacity_exceeded_after_retry_budget() {
    let client = ScriptedClient::new().throttle(10);
    let executor = executor(client, 3);

    let plan = orders().get(("A1", "2024-01-01")).build().unwrap();
    let err = executor.get::<Order>(&plan).await.unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { attempts: 4 }));
    assert_eq!(err.code(), "CAPACITY_EXCEEDED");
    // One initial attempt plus three retries
    assert_eq!(executor.client().call_count(), 4);
    assert_eq!(executor.client().remaining(), 6);
}

#[tokio::test]
async fn test_no_retry_policy_makes_one_attempt() {
    let client = ScriptedClient::new().throttle(1);
    let config = ExecutorConfig::new().with_retry(RetryPolicy::no_retry());
    let executor = Executor::with_config(client, config).unwrap();

    let plan = orders().get(("A1", "2024-01-01")).build().unwrap();
    let err = executor.get::<Order>(&plan).await.unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { attempts: 1 }));
    assert_eq!(executor.client().call_count(), 1);
}

#[tokio::test]
async fn test_condition_failure_is_a_value_and_not_retried() {
    let client = ScriptedClient::new()
        .fail(StoreError::ConditionalCheckFailed("The conditional request failed".into()));
    let executor = executor(client, 5);

    let plan = orders().put(&order("A1", "2024-01-01", 1)).if_not_exists().build().unwrap();
    let outcome = executor.write(&plan).await.unwrap();
    assert!(matches!(outcome, WriteOutcome::ConditionFailed(_)));
    assert!(!outcome.is_written());
    assert_eq!(executor.client().call_count(), 1);
}

#[tokio::test]
async fn test_service_error_is_not_retried() {
    let client = ScriptedClient::new()
        .fail(StoreError::Service("ValidationException: bad".into()))
        .reply(StoreResponse::default());
    let executor = executor(client, 5);

    let plan = orders().delete(("A1", "2024-01-01")).build().unwrap();
    assert!(matches!(executor.write(&plan).await, Err(Error::Service(_))));
    assert_eq!(executor.client().call_count(), 1);
}

#[tokio::test]
async fn test_memory_store_throttling_recovers() {
    let (orders, store, executor) = single_table::<Order>().unwrap();
    store.throttle_next(3);

    let plan = orders.put(&order("A1", "2024-01-01", 1)).build().unwrap();
    assert!(executor.write(&plan).await.unwrap().is_written());
    assert_eq!(store.request_count(), 4);
    assert_eq!(store.item_count("orders"), 1);
}

#[tokio::test]
async fn test_retry_config_from_json() {
    let config = ExecutorConfig::from_json(
        r#"{"retry": {"max_attempts": 1, "initial_backoff_ms": 1, "max_backoff_ms": 2, "jitter": "equal"}}"#,
    )
    .unwrap();
    assert_eq!(config.retry.jitter, Jitter::Equal);

    let executor = Executor::with_config(ScriptedClient::new().throttle(5), config).unwrap();
    let plan = orders().get(("A1", "2024-01-01")).build().unwrap();
    assert!(matches!(
        executor.get::<Order>(&plan).await,
        Err(Error::CapacityExceeded { attempts: 2 })
    ));
}
