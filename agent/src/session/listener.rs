//! Background reconnect listener
//!
//! Drains the supervisor's reconnect signal, lets the remote side settle,
//! refreshes the tool set (which reconnects) and republishes it on a
//! single-slot watch channel. The session picks the new set up before its
//! next request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mcp::{ReconnectSignal, Supervisor, ToolSet, ToolSetRefresher};

/// Pause between a failure signal and the reconnect attempt
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Handle to the running listener task
pub struct ReconnectListener {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl ReconnectListener {
    /// Stop the listener and wait for it to exit.
    ///
    /// A refresh already in progress finishes first.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

pub fn spawn_reconnect_listener(
    supervisor: Arc<Supervisor>,
    refresher: ToolSetRefresher,
    mut signal: ReconnectSignal,
    publish: watch::Sender<ToolSet>,
    settle_delay: Duration,
) -> ReconnectListener {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                alive = signal.notified() => {
                    if !alive {
                        break;
                    }
                }
            }

            tracing::info!("Reconnect requested for {}", supervisor.endpoint());

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(settle_delay) => {}
            }

            match refresher.refresh(&supervisor).await {
                Ok(tools) => {
                    tracing::info!("Reconnected, {} tools available", tools.len());
                    publish.send_replace(tools);
                }
                Err(e) => {
                    // A failed enumeration re-raises the signal; a failed
                    // connect waits for the next reported failure.
                    tracing::warn!("Reconnect failed: {}", e);
                }
            }
        }

        tracing::debug!("Reconnect listener stopped");
    });

    ReconnectListener { handle, cancel }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::mcp::testing::{FakeFactory, FakeScript};
    use crate::mcp::{ClientIdentity, ConnectPolicy};

    fn supervisor(factory: Arc<FakeFactory>) -> Arc<Supervisor> {
        Arc::new(Supervisor::new(
            "http://localhost:12345/mcp",
            factory,
            ConnectPolicy::default(),
            ClientIdentity::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_triggers_refresh_and_publish() {
        let (factory, script) = FakeFactory::new();
        script.set_tools(&["list_containers"]);
        let sup = supervisor(factory);
        let signal = sup.reconnect_signal().unwrap();
        let (tx, mut rx) = watch::channel(ToolSet::default());

        let listener = spawn_reconnect_listener(
            sup.clone(),
            ToolSetRefresher::default(),
            signal,
            tx,
            DEFAULT_SETTLE_DELAY,
        );

        sup.report_failure("connection reset").await;
        rx.changed().await.unwrap();

        assert_eq!(rx.borrow_and_update().names(), vec!["list_containers"]);
        assert!(!sup.needs_reconnect().await);
        assert_eq!(FakeScript::count(&script.lists), 1);

        listener.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_before_reconnect() {
        let (factory, script) = FakeFactory::new();
        let sup = supervisor(factory);
        let signal = sup.reconnect_signal().unwrap();
        let (tx, mut rx) = watch::channel(ToolSet::default());

        let listener = spawn_reconnect_listener(
            sup.clone(),
            ToolSetRefresher::default(),
            signal,
            tx,
            DEFAULT_SETTLE_DELAY,
        );

        let started = tokio::time::Instant::now();
        sup.report_failure("EOF").await;
        rx.changed().await.unwrap();

        assert!(started.elapsed() >= DEFAULT_SETTLE_DELAY);
        assert_eq!(FakeScript::count(&script.creates), 1);

        listener.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_enumeration_keeps_previous_tools() {
        let (factory, script) = FakeFactory::new();
        script.fail_list.store(true, Ordering::SeqCst);
        let sup = supervisor(factory);
        let signal = sup.reconnect_signal().unwrap();
        let (tx, rx) = watch::channel(ToolSet::new(vec![crate::mcp::McpTool::new("old")]));

        let listener = spawn_reconnect_listener(
            sup.clone(),
            ToolSetRefresher::default(),
            signal,
            tx,
            DEFAULT_SETTLE_DELAY,
        );

        sup.report_failure("EOF").await;
        tokio::time::sleep(DEFAULT_SETTLE_DELAY * 2).await;
        listener.stop().await;

        assert_eq!(rx.borrow().names(), vec!["old"]);
        assert!(sup.needs_reconnect().await);
    }

    #[tokio::test]
    async fn test_stop_without_signal() {
        let (factory, _script) = FakeFactory::new();
        let sup = supervisor(factory);
        let signal = sup.reconnect_signal().unwrap();
        let (tx, _rx) = watch::channel(ToolSet::default());

        let listener = spawn_reconnect_listener(
            sup,
            ToolSetRefresher::default(),
            signal,
            tx,
            DEFAULT_SETTLE_DELAY,
        );
        listener.stop().await;
    }
}
