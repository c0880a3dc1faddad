pub mod client;
pub mod config;
pub mod executor; // retry state machine, writes, batches
pub mod stream; // lazy pagination

pub use client::{StoreClient, StoreError, StoreRequest, StoreResponse};
pub use config::ExecutorConfig;
pub use executor::{BatchGetOutcome, BatchWriteOutcome, Executor, TransactOutcome, WriteOutcome};
pub use stream::{ItemStream, Page};

pub use dynaq_core::{Error, Result};
