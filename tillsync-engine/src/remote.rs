//! Remote service capability.
//!
//! The backend RPC transport is injected; the engine only ever sees this
//! trait. Operations are named strings (`"ingredient.get"`) with JSON
//! arguments, mirroring the RPC surface of the host application.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde_json::Value;

/// Injected backend RPC transport.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Invokes a named remote operation and returns its JSON result.
    async fn call(&self, operation: &str, args: Value) -> SyncResult<Value>;
}

/// A scriptable remote service for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    enum Scripted {
        Ok(Value),
        Err(SyncError),
        /// Never resolves; used to exercise the per-attempt timeout.
        Hang,
    }

    /// A `RemoteService` that replays queued responses in order and
    /// counts calls. When the queue is empty it fails with a network
    /// error, which keeps forgotten scripts loud in tests.
    #[derive(Clone, Default)]
    pub struct MockRemote {
        responses: Arc<Mutex<VecDeque<Scripted>>>,
        calls: Arc<AtomicU32>,
    }

    impl MockRemote {
        /// Creates an empty mock.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a successful response.
        pub fn queue_ok(&self, value: Value) {
            self.responses.lock().unwrap().push_back(Scripted::Ok(value));
        }

        /// Queues a failure.
        pub fn queue_err(&self, err: SyncError) {
            self.responses.lock().unwrap().push_back(Scripted::Err(err));
        }

        /// Queues a response that never resolves, for timeout tests.
        pub fn queue_hang(&self) {
            self.responses.lock().unwrap().push_back(Scripted::Hang);
        }

        /// Number of calls made so far.
        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteService for MockRemote {
        async fn call(&self, _operation: &str, _args: Value) -> SyncResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Ok(value)) => Ok(value),
                Some(Scripted::Err(err)) => Err(err),
                Some(Scripted::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                None => Err(SyncError::Network("no scripted response".into())),
            }
        }
    }
}
