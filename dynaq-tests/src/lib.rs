/// Test utilities for dynaq
///
/// Provides an in-memory store that speaks the `StoreClient` protocol, a
/// scripted client for exact call sequences, and shared shapes.

pub mod expression;
pub mod fixtures;
pub mod memory;
pub mod scripted;

pub use memory::MemoryStore;
pub use scripted::ScriptedClient;

use dynaq_api::{Executor, ExecutorConfig};
use dynaq_core::{RetryPolicy, Shape, Table};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once. `RUST_LOG` controls the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Retry policy with millisecond backoffs so retry tests stay fast
pub fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, 1, 5, 2.0)
}

/// Memory store with a table for each given shape, plus an executor over it
pub fn memory_executor(tables: &[&dynaq_core::ShapeDescriptor]) -> anyhow::Result<(Arc<MemoryStore>, Executor<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    for descriptor in tables {
        store.create_table(descriptor);
    }
    let config = ExecutorConfig::new().with_retry(quick_retry(3));
    let executor = Executor::from_shared(store.clone(), config)?;
    Ok((store, executor))
}

/// Memory store holding one shape's table
pub fn single_table<S: Shape>() -> anyhow::Result<(Table<S>, Arc<MemoryStore>, Executor<MemoryStore>)> {
    let table = Table::<S>::compile()?;
    let (store, executor) = memory_executor(&[table.descriptor().as_ref()])?;
    Ok((table, store, executor))
}
