//! Session loop orchestration
//!
//! One interactive request at a time: make sure the tool set is fresh, run
//! the request as a background task with its own deadline, and race that
//! task against a longer outer guard. Transport-shaped failures are reported
//! to the supervisor so the reconnect listener can repair the connection
//! before the next turn.

mod classify;
mod dialog;
mod executor;
mod listener;

pub use classify::{mentions_transport_failure, FailureClass, TRANSPORT_KEYWORDS};
pub use dialog::{last_user_message, Dialog, Message, Role, DEFAULT_MAX_HISTORY};
pub use executor::{
    parse_invocation, ExecError, Executor, ExecutorFactory, RequestWindow, ToolCallExecutor,
    ToolCallExecutorFactory,
};
pub use listener::{spawn_reconnect_listener, ReconnectListener, DEFAULT_SETTLE_DELAY};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::mcp::{RefreshError, Supervisor, ToolSet, ToolSetRefresher};

/// Default deadline handed to the executor
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
/// Default hard ceiling on one request
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(50);
/// Default age after which the tool set is refreshed before a request
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub request_timeout: Duration,
    /// Must exceed `request_timeout`
    pub guard_timeout: Duration,
    pub refresh_interval: Duration,
    pub max_history: usize,
    pub system_prompt: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            guard_timeout: DEFAULT_GUARD_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            max_history: DEFAULT_MAX_HISTORY,
            system_prompt: None,
        }
    }
}

/// How a submitted request ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Reply produced
    Completed(String),
    /// The remote operation ran and failed; the connection is fine
    Failed(String),
    /// Transport failure, reported to the supervisor; a reconnect is underway
    Reconnecting(String),
    /// Outer guard fired; the request was abandoned
    TimedOut(Duration),
    /// Tools could not be refreshed before running the request
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("failed to prepare executor: {0}")]
    Executor(#[from] ExecError),
}

/// Interactive session over one supervised connection
pub struct Session {
    supervisor: Arc<Supervisor>,
    refresher: ToolSetRefresher,
    factory: Arc<dyn ExecutorFactory>,
    config: SessionConfig,
    tools: ToolSet,
    executor: Arc<dyn Executor>,
    updates: watch::Receiver<ToolSet>,
    last_refresh: Instant,
    dialog: Dialog,
    /// Input to resubmit once the listener republishes tools
    pending_retry: Option<String>,
    retry_ready: bool,
    retrying: bool,
}

impl Session {
    /// Load the initial tool set and build the first executor.
    ///
    /// Fails if the remote server cannot be reached at all; there is nothing
    /// useful to do without tools.
    pub async fn start(
        supervisor: Arc<Supervisor>,
        refresher: ToolSetRefresher,
        factory: Arc<dyn ExecutorFactory>,
        config: SessionConfig,
        mut updates: watch::Receiver<ToolSet>,
    ) -> Result<Self, SessionError> {
        let tools = refresher.refresh(&supervisor).await?;
        let executor = factory.build(tools.clone())?;
        updates.borrow_and_update();

        tracing::info!(
            "Session started with {} tools from {}",
            tools.len(),
            supervisor.endpoint()
        );

        let dialog = Dialog::new(config.system_prompt.clone(), config.max_history);
        Ok(Self {
            supervisor,
            refresher,
            factory,
            config,
            tools,
            executor,
            updates,
            last_refresh: Instant::now(),
            dialog,
            pending_retry: None,
            retry_ready: false,
            retrying: false,
        })
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clear_history(&mut self) {
        self.dialog.clear();
    }

    fn install(&mut self, tools: ToolSet) -> Result<(), ExecError> {
        self.executor = self.factory.build(tools.clone())?;
        self.tools = tools;
        self.last_refresh = Instant::now();
        Ok(())
    }

    /// Adopt a tool set republished by the reconnect listener.
    ///
    /// Returns true if a new set was installed.
    pub fn apply_updates(&mut self) -> Result<bool, SessionError> {
        if !self.updates.has_changed().unwrap_or(false) {
            return Ok(false);
        }

        let tools = self.updates.borrow_and_update().clone();
        tracing::debug!("Adopting {} republished tools", tools.len());
        self.install(tools)?;

        if self.pending_retry.is_some() {
            self.retry_ready = true;
        }
        Ok(true)
    }

    /// Input to resubmit after a reconnect, if one is due.
    ///
    /// Each failed input is offered at most once.
    pub fn take_retry(&mut self) -> Option<String> {
        if !self.retry_ready {
            return None;
        }
        self.retry_ready = false;
        let input = self.pending_retry.take()?;
        self.retrying = true;
        Some(input)
    }

    /// True while a failed input waits for a reconnect
    pub fn retry_pending(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// Wait until the listener republishes tools.
    ///
    /// The new set stays unseen so the next [`Session::apply_updates`]
    /// installs it. Never returns once the publishing side is gone.
    pub async fn updated(&mut self) {
        if self.updates.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        self.updates.mark_changed();
    }

    /// Refresh the tool set now, reconnecting if needed
    pub async fn refresh_tools(&mut self) -> Result<usize, SessionError> {
        let tools = self.refresher.refresh(&self.supervisor).await?;
        let count = tools.len();
        self.install(tools)?;
        Ok(count)
    }

    async fn ensure_fresh(&mut self) -> Result<(), SessionError> {
        self.apply_updates()?;

        let stale = self.last_refresh.elapsed() >= self.config.refresh_interval;
        if stale {
            tracing::info!("Tool set is older than {:?}, refreshing", self.config.refresh_interval);
        }

        if stale || self.supervisor.needs_reconnect().await {
            self.refresh_tools().await?;
        }
        Ok(())
    }

    /// Run one request to completion or abandonment.
    ///
    /// Never takes longer than the refresh (if one is needed) plus the
    /// guard timeout.
    pub async fn submit(&mut self, input: &str) -> TurnOutcome {
        let retrying = std::mem::take(&mut self.retrying);
        if !retrying {
            self.pending_retry = None;
            self.retry_ready = false;
        }

        if let Err(e) = self.ensure_fresh().await {
            tracing::error!("Could not prepare request: {}", e);
            return TurnOutcome::Unavailable(e.to_string());
        }

        let mut messages = self.dialog.messages();
        messages.push(Message::new(Role::User, input));

        let window = RequestWindow::new(self.config.request_timeout, self.config.guard_timeout);
        let executor = self.executor.clone();
        let task = tokio::spawn(async move { executor.execute(messages, window).await });

        // Dropping the join handle on guard expiry detaches the task
        let result = match tokio::time::timeout_at(window.guard_deadline(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ExecError::Failed(format!("request task failed: {}", join))),
            Err(_) => {
                tracing::warn!("Request abandoned after {:?}", window.guard);
                self.supervisor
                    .report_failure(format!("request exceeded {:?} guard timeout", window.guard))
                    .await;
                return TurnOutcome::TimedOut(window.guard);
            }
        };

        match result {
            Ok(reply) => {
                self.dialog.push_user(input);
                self.dialog.push_assistant(reply.clone());
                TurnOutcome::Completed(reply)
            }
            Err(e) => match e.class() {
                FailureClass::Transport => {
                    self.supervisor.report_failure(&e).await;
                    if !retrying {
                        self.pending_retry = Some(input.to_string());
                    }
                    TurnOutcome::Reconnecting(e.to_string())
                }
                FailureClass::Business => TurnOutcome::Failed(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::mcp::testing::{FakeFactory, FakeScript};
    use crate::mcp::{ClientIdentity, ConnectPolicy, TransportError};

    #[derive(Debug, Clone)]
    enum Step {
        Reply(&'static str),
        Fail(ExecError),
        /// Ignores its deadline and never finishes
        Hang,
        /// Waits out its deadline, then reports it
        Stall,
    }

    #[derive(Default)]
    struct Plan {
        steps: Mutex<VecDeque<Step>>,
        builds: AtomicU32,
        runs: AtomicU32,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    struct PlannedExecutor {
        plan: Arc<Plan>,
    }

    #[async_trait]
    impl Executor for PlannedExecutor {
        async fn execute(
            &self,
            dialog: Vec<Message>,
            window: RequestWindow,
        ) -> Result<String, ExecError> {
            self.plan.runs.fetch_add(1, Ordering::SeqCst);
            self.plan.seen.lock().unwrap().push(dialog);
            let step = self.plan.steps.lock().unwrap().pop_front();
            match step.unwrap_or(Step::Reply("ok")) {
                Step::Reply(text) => Ok(text.to_string()),
                Step::Fail(e) => Err(e),
                Step::Hang => std::future::pending().await,
                Step::Stall => {
                    tokio::time::sleep_until(window.deadline()).await;
                    Err(ExecError::DeadlineExceeded(window.timeout))
                }
            }
        }
    }

    struct PlanFactory(Arc<Plan>);

    impl ExecutorFactory for PlanFactory {
        fn build(&self, _tools: ToolSet) -> Result<Arc<dyn Executor>, ExecError> {
            self.0.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(PlannedExecutor {
                plan: self.0.clone(),
            }))
        }
    }

    struct Harness {
        session: Session,
        plan: Arc<Plan>,
        script: Arc<FakeScript>,
        publish: watch::Sender<ToolSet>,
    }

    async fn harness(steps: Vec<Step>) -> Harness {
        let (factory, script) = FakeFactory::new();
        script.set_tools(&["list_containers", "list_pods"]);
        let supervisor = Arc::new(Supervisor::new(
            "http://localhost:12345/mcp",
            factory,
            ConnectPolicy::default(),
            ClientIdentity::default(),
        ));
        let plan = Arc::new(Plan::default());
        plan.steps.lock().unwrap().extend(steps);
        let (publish, updates) = watch::channel(ToolSet::default());

        let session = Session::start(
            supervisor,
            ToolSetRefresher::default(),
            Arc::new(PlanFactory(plan.clone())),
            SessionConfig::default(),
            updates,
        )
        .await
        .unwrap();

        Harness {
            session,
            plan,
            script,
            publish,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_loads_tools() {
        let h = harness(vec![]).await;

        assert_eq!(h.session.tools().names(), vec!["list_containers", "list_pods"]);
        assert_eq!(h.plan.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_when_server_unreachable() {
        let (factory, script) = FakeFactory::new();
        script.fail_create.store(true, Ordering::SeqCst);
        let supervisor = Arc::new(Supervisor::new(
            "http://localhost:12345/mcp",
            factory,
            ConnectPolicy::default(),
            ClientIdentity::default(),
        ));
        let (_publish, updates) = watch::channel(ToolSet::default());

        let result = Session::start(
            supervisor,
            ToolSetRefresher::default(),
            Arc::new(PlanFactory(Arc::new(Plan::default()))),
            SessionConfig::default(),
            updates,
        )
        .await;

        assert!(matches!(result, Err(SessionError::Refresh(RefreshError::Connect(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_turn_is_kept_in_history() {
        let mut h = harness(vec![Step::Reply("3 containers running")]).await;

        let outcome = h.session.submit("list_containers").await;

        assert_eq!(outcome, TurnOutcome::Completed("3 containers running".into()));
        assert_eq!(h.session.dialog().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_guard_bounds_hung_request() {
        let mut h = harness(vec![Step::Hang]).await;
        let started = Instant::now();

        let outcome = h.session.submit("list_pods").await;

        assert_eq!(outcome, TurnOutcome::TimedOut(DEFAULT_GUARD_TIMEOUT));
        assert_eq!(started.elapsed(), DEFAULT_GUARD_TIMEOUT);
        assert_eq!(h.session.supervisor().status().await.failures_reported, 1);
        assert!(h.session.dialog().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_deadline_is_a_transport_failure() {
        let mut h = harness(vec![Step::Stall]).await;
        let started = Instant::now();

        let outcome = h.session.submit("list_pods").await;

        assert!(matches!(outcome, TurnOutcome::Reconnecting(_)));
        assert_eq!(started.elapsed(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(h.session.supervisor().status().await.failures_reported, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_text_is_classified_as_transport() {
        let mut h = harness(vec![Step::Fail(ExecError::Failed(
            "tool call timeout waiting for response".into(),
        ))])
        .await;

        let outcome = h.session.submit("list_pods").await;

        assert!(matches!(outcome, TurnOutcome::Reconnecting(_)));
        assert_eq!(h.session.supervisor().status().await.failures_reported, 1);
        assert!(h.session.supervisor().needs_reconnect().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_business_error_does_not_report() {
        let mut h = harness(vec![Step::Fail(ExecError::Transport(TransportError::Remote(
            "namespace kube-test not found".into(),
        )))])
        .await;

        let outcome = h.session.submit("list_pods").await;

        assert_eq!(
            outcome,
            TurnOutcome::Failed("remote error: namespace kube-test not found".into())
        );
        assert_eq!(h.session.supervisor().status().await.failures_reported, 0);
        assert!(h.session.take_retry().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_before_running_on_broken_connection() {
        let mut h = harness(vec![]).await;
        h.session.supervisor().report_failure("EOF").await;
        h.script.set_tools(&["list_images"]);

        let outcome = h.session.submit("list_images").await;

        assert_eq!(outcome, TurnOutcome::Completed("ok".into()));
        assert_eq!(h.session.tools().names(), vec!["list_images"]);
        assert_eq!(FakeScript::count(&h.script.lists), 2);
        assert_eq!(h.plan.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_after_interval() {
        let mut h = harness(vec![]).await;

        h.session.submit("list_pods").await;
        assert_eq!(FakeScript::count(&h.script.lists), 1);

        tokio::time::advance(DEFAULT_REFRESH_INTERVAL).await;
        h.session.submit("list_pods").await;
        assert_eq!(FakeScript::count(&h.script.lists), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_when_refresh_fails() {
        let mut h = harness(vec![]).await;
        h.session.supervisor().report_failure("EOF").await;
        h.script.fail_list.store(true, Ordering::SeqCst);

        let outcome = h.session.submit("list_pods").await;

        assert!(matches!(outcome, TurnOutcome::Unavailable(_)));
        assert_eq!(h.plan.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_republished_tools_trigger_one_retry() {
        let mut h = harness(vec![
            Step::Fail(ExecError::Transport(TransportError::Connection("EOF".into()))),
            Step::Fail(ExecError::Transport(TransportError::Connection("EOF".into()))),
        ])
        .await;

        let outcome = h.session.submit("list_pods").await;
        assert!(matches!(outcome, TurnOutcome::Reconnecting(_)));
        assert!(h.session.take_retry().is_none());

        h.publish.send_replace(ToolSet::new(vec![crate::mcp::McpTool::new("list_pods")]));
        assert!(h.session.apply_updates().unwrap());
        let retry = h.session.take_retry().unwrap();
        assert_eq!(retry, "list_pods");

        // The retry fails the same way; it is not offered again
        let outcome = h.session.submit(&retry).await;
        assert!(matches!(outcome, TurnOutcome::Reconnecting(_)));
        h.publish.send_replace(ToolSet::new(vec![crate::mcp::McpTool::new("list_pods")]));
        assert!(h.session.apply_updates().unwrap());
        assert!(h.session.take_retry().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_for_update_leaves_it_to_apply() {
        let mut h = harness(vec![Step::Fail(ExecError::Transport(
            TransportError::Connection("EOF".into()),
        ))])
        .await;

        h.session.submit("list_pods").await;
        let publisher = &h.publish;
        let publish = async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            publisher.send_replace(ToolSet::new(vec![crate::mcp::McpTool::new("list_images")]));
        };
        tokio::join!(h.session.updated(), publish);

        assert!(h.session.apply_updates().unwrap());
        assert_eq!(h.session.tools().names(), vec!["list_images"]);
        assert_eq!(h.plan.builds.load(Ordering::SeqCst), 2);
        assert_eq!(h.session.take_retry().as_deref(), Some("list_pods"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_turns_stay_out_of_history() {
        let mut h = harness(vec![
            Step::Reply("first"),
            Step::Fail(ExecError::Failed("permission denied".into())),
            Step::Reply("third"),
        ])
        .await;

        h.session.submit("one").await;
        h.session.submit("two").await;
        h.session.submit("three").await;

        let seen = h.plan.seen.lock().unwrap();
        let last: Vec<_> = seen[2].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(last, vec!["one", "first", "three"]);
    }
}
