//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use endpoint_router::backend::{BackendError, ContextDelta, LocalBackend, ProvisioningBackend};
use endpoint_router::model::ContextModel;
use endpoint_router::resilience::RetryPolicy;
use endpoint_router::{Batch, ContextPath, Engine, EngineTasks, EndpointId, EndpointSpec, OwnerId, Shutdown};

pub fn owner(name: &str) -> OwnerId {
    OwnerId::new(name).unwrap()
}

pub fn ctx(path: &str) -> ContextPath {
    ContextPath::parse(path).unwrap()
}

pub fn eid(id: &str) -> EndpointId {
    EndpointId::new(id).unwrap()
}

pub fn servlet(id: &str, context: &str, patterns: &[&str]) -> EndpointSpec {
    EndpointSpec::servlet(eid(id), ctx(context), patterns.iter().copied())
}

/// Retries without real waiting.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay_ms: 1,
        max_delay_ms: 2,
        attempt_timeout: Duration::from_secs(2),
    }
}

pub struct TestEngine {
    pub engine: Engine,
    pub shutdown: Shutdown,
    pub tasks: EngineTasks,
}

impl TestEngine {
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.tasks.join().await;
    }
}

pub fn start_engine(backend: Arc<dyn ProvisioningBackend>, max_attempts: u32) -> TestEngine {
    let shutdown = Shutdown::new();
    let (engine, tasks) = Engine::start(backend, fast_policy(max_attempts), &shutdown);
    TestEngine { engine, shutdown, tasks }
}

pub fn start_local() -> (TestEngine, Arc<LocalBackend>) {
    let backend = Arc::new(LocalBackend::new());
    (start_engine(backend.clone(), 3), backend)
}

/// Submit a batch and wait until the backend has caught up.
pub async fn commit(engine: &Engine, batch: Batch) {
    let mut receipt = engine.submit(batch).await.unwrap();
    receipt.provisioned().await.unwrap();
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Backend whose failures are scripted per context path.
#[derive(Default)]
pub struct ScriptedBackend {
    /// Remaining provision failures per context; `u32::MAX` means forever.
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_provision(&self, context: &str, times: u32) {
        self.failures.lock().unwrap().insert(context.to_string(), times);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvisioningBackend for ScriptedBackend {
    async fn provision(&self, delta: &ContextDelta) -> Result<(), BackendError> {
        let path = delta.path().as_str().to_string();
        self.calls.lock().unwrap().push(format!("provision {}", path));
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&path) {
            Some(left) if *left > 0 => {
                if *left != u32::MAX {
                    *left -= 1;
                }
                Err(BackendError::Unavailable(format!("scripted failure for '{}'", path)))
            }
            _ => Ok(()),
        }
    }

    async fn deprovision(&self, context: &ContextModel) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("deprovision {}", context.path.as_str()));
        Ok(())
    }
}
