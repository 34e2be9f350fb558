//! Connection Monitor (C9).
//!
//! Periodically probes agent reachability and emits edge-triggered
//! `connected`/`disconnected` events: `connected` on the first success
//! after any non-success, `disconnected` on the first failure after any
//! success. The very first probe only establishes a baseline — there is no
//! prior state to transition from.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use voice_core::ports::AgentTransportPort;

pub struct ConnectionMonitor {
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ConnectionMonitor {
    /// `edge_tx` receives the new `connected` value only when it differs
    /// from the previous probe; the session manager owns translating that
    /// into `VoiceEvent::ConnectionChanged` and its own `agent_connected`
    /// aux state.
    pub fn start(
        transport: Arc<dyn AgentTransportPort>,
        interval: Duration,
        edge_tx: tokio::sync::mpsc::UnboundedSender<bool>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_healthy: Option<bool> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let healthy = transport.health_check().await;
                        match last_healthy {
                            None => {
                                debug!(healthy, "connection monitor baseline established");
                            }
                            Some(prev) if prev != healthy => {
                                let _ = edge_tx.send(healthy);
                            }
                            _ => {}
                        }
                        last_healthy = Some(healthy);
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        Self {
            handle: Some(handle),
            stop_tx: Some(stop_tx),
        }
    }

    /// Idempotent; may be called from any exit path.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use voice_core::ports::AgentTransportError;
    use voice_core::AgentReply;

    struct FlakyTransport {
        healthy: AtomicBool,
    }

    #[async_trait]
    impl AgentTransportPort for FlakyTransport {
        async fn send(
            &self,
            _text: &str,
            _session_id: Option<&str>,
        ) -> Result<AgentReply, AgentTransportError> {
            unimplemented!("not exercised by the connection monitor")
        }

        async fn health_check(&self) -> bool {
            self.healthy.load(Ordering::Relaxed)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_disconnected_only_on_the_edge() {
        let transport = Arc::new(FlakyTransport {
            healthy: AtomicBool::new(true),
        });
        let (edge_tx, mut edge_rx) = tokio::sync::mpsc::unbounded_channel();

        let mut monitor =
            ConnectionMonitor::start(transport.clone(), Duration::from_millis(10), edge_tx);

        tokio::time::advance(Duration::from_millis(15)).await; // baseline: healthy
        transport.healthy.store(false, Ordering::Relaxed);
        tokio::time::advance(Duration::from_millis(10)).await; // edge: disconnected
        tokio::time::advance(Duration::from_millis(10)).await; // still unhealthy, no re-emit

        monitor.stop();
        edge_rx.close();

        let mut disconnects = 0;
        while let Ok(connected) = edge_rx.try_recv() {
            if !connected {
                disconnects += 1;
            }
        }
        assert_eq!(disconnects, 1);
    }
}
