/// Scripted store client: replies from a queue and records every request
use async_trait::async_trait;
use dynaq_api::{StoreClient, StoreError, StoreRequest, StoreResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Client that answers with pre-queued results in order.
///
/// Once the queue is empty every call fails with a service error, so an
/// unexpected extra call shows up as a test failure.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<StoreResponse, StoreError>>>,
    calls: Mutex<Vec<StoreRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, response: StoreResponse) -> Self {
        self.replies.lock().push_back(Ok(response));
        self
    }

    pub fn fail(self, error: StoreError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Queue `n` throttling failures
    pub fn throttle(self, n: usize) -> Self {
        {
            let mut replies = self.replies.lock();
            for _ in 0..n {
                replies.push_back(Err(StoreError::Throttling("throughput exceeded".into())));
            }
        }
        self
    }

    pub fn calls(&self) -> Vec<StoreRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }

    /// Panic if any request reached the client
    pub fn assert_not_called(&self) {
        let calls = self.calls.lock();
        assert!(calls.is_empty(), "expected no store calls, got {}: {:?}", calls.len(), calls);
    }
}

#[async_trait]
impl StoreClient for ScriptedClient {
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        self.calls.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(StoreError::Service("no scripted reply left".into())))
    }
}
