//! Scripted transport used by unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::error::TransportError;
use super::transport::{McpTransport, TransportFactory};
use super::types::{ClientIdentity, McpTool, ServerSummary, ToolOutput};

/// How a scripted `start` behaves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartStep {
    Succeed,
    Fail,
    /// Never completes
    Hang,
    /// Succeeds after a delay
    Delay(Duration),
}

/// Shared script and counters for every handle a [`FakeFactory`] creates
#[derive(Default)]
pub struct FakeScript {
    pub creates: AtomicU32,
    pub starts: AtomicU32,
    pub initializes: AtomicU32,
    pub lists: AtomicU32,
    pub calls: AtomicU32,
    pub closes: AtomicU32,
    pub fail_create: AtomicBool,
    pub fail_initialize: AtomicBool,
    pub fail_list: AtomicBool,
    pub hang_list: AtomicBool,
    pub hang_close: AtomicBool,
    /// Calls to fail with a dropped stream before behaving again
    pub fail_calls: AtomicU32,
    start_steps: Mutex<VecDeque<StartStep>>,
    tools: Mutex<Vec<McpTool>>,
}

impl FakeScript {
    /// Queue start behaviours; once drained, starts succeed
    pub fn push_starts(&self, steps: impl IntoIterator<Item = StartStep>) {
        self.start_steps.lock().unwrap().extend(steps);
    }

    pub fn set_tools(&self, names: &[&str]) {
        *self.tools.lock().unwrap() = names.iter().map(|n| McpTool::new(*n)).collect();
    }

    fn next_start(&self) -> StartStep {
        self.start_steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StartStep::Succeed)
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    script: Arc<FakeScript>,
}

#[async_trait]
impl McpTransport for FakeTransport {
    async fn start(&self) -> Result<(), TransportError> {
        self.script.starts.fetch_add(1, Ordering::SeqCst);
        match self.script.next_start() {
            StartStep::Succeed => Ok(()),
            StartStep::Fail => Err(TransportError::Connection("connection refused".into())),
            StartStep::Hang => std::future::pending().await,
            StartStep::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }

    async fn initialize(&self, _identity: &ClientIdentity) -> Result<ServerSummary, TransportError> {
        self.script.initializes.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_initialize.load(Ordering::SeqCst) {
            return Err(TransportError::Protocol("unsupported protocol version".into()));
        }
        Ok(ServerSummary {
            name: "fake".into(),
            version: "0.0.0".into(),
            protocol_version: "2025-03-26".into(),
        })
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, TransportError> {
        self.script.lists.fetch_add(1, Ordering::SeqCst);
        if self.script.hang_list.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.script.fail_list.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("EOF".into()));
        }
        Ok(self.script.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolOutput, TransportError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .script
            .fail_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(TransportError::Connection("EOF".into()));
        }
        let args = arguments.map(|a| a.to_string()).unwrap_or_default();
        Ok(ToolOutput {
            text: format!("{} {}", name, args).trim_end().to_string(),
            is_error: false,
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
        if self.script.hang_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Err(TransportError::Connection("already closed".into()))
    }
}

pub struct FakeFactory {
    pub script: Arc<FakeScript>,
}

impl FakeFactory {
    pub fn new() -> (Arc<Self>, Arc<FakeScript>) {
        let script = Arc::new(FakeScript::default());
        (
            Arc::new(Self {
                script: script.clone(),
            }),
            script,
        )
    }
}

impl TransportFactory for FakeFactory {
    fn create(&self, endpoint: &str) -> Result<Arc<dyn McpTransport>, TransportError> {
        self.script.creates.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "scripted".into(),
            });
        }
        Ok(Arc::new(FakeTransport {
            script: self.script.clone(),
        }))
    }
}
