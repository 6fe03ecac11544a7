//! Connectivity monitor.
//!
//! Probes `GET /` once on start and then on a fixed interval for as long as
//! the session lives. A single failed probe flips the session to offline;
//! the next scheduled probe is the only recovery path.

use std::sync::Arc;
use std::time::Duration;

use forge_client::ForgeClient;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::session::SessionContext;
use crate::types::LivenessState;

/// Default probe cadence.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

pub struct ConnectivityMonitor {
    session: Arc<SessionContext>,
    client: ForgeClient,
    interval: Duration,
}

impl ConnectivityMonitor {
    pub fn new(session: Arc<SessionContext>, client: ForgeClient) -> Self {
        Self {
            session,
            client,
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Probe once and record the verdict on the session.
    pub async fn probe_once(&self) -> LivenessState {
        let state = match self.client.probe(self.session.shutdown_token()).await {
            Ok(()) => LivenessState::Online,
            Err(err) => {
                debug!("liveness probe failed: {}", err);
                LivenessState::Offline
            }
        };

        if self.session.is_closed() {
            return self.session.liveness();
        }

        let previous = self.session.set_liveness(state);
        if previous != state {
            match state {
                LivenessState::Offline => warn!(from = %previous, "service is offline"),
                _ => info!(from = %previous, to = %state, "service liveness changed"),
            }
        } else {
            debug!(state = %state, "liveness unchanged");
        }
        state
    }

    /// Run the probe loop until the session is closed.
    pub async fn run(self) {
        self.session.set_liveness(LivenessState::Checking);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = self.session.shutdown_token().clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
        debug!("connectivity monitor stopped");
    }

    /// Spawn the probe loop onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_client::{MockReply, MockTransport, RetryPolicy};

    fn client(transport: &MockTransport, url: Option<&str>) -> ForgeClient {
        ForgeClient::new(
            url.map(str::to_string),
            Arc::new(transport.clone()),
            RetryPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_once_online_and_offline() {
        let transport = MockTransport::new()
            .on("/", MockReply::status(200))
            .on("/", MockReply::status(502));
        let session = SessionContext::new();
        let monitor = ConnectivityMonitor::new(session.clone(), client(&transport, Some("http://h")));

        assert_eq!(monitor.probe_once().await, LivenessState::Online);
        assert_eq!(session.liveness(), LivenessState::Online);

        assert_eq!(monitor.probe_once().await, LivenessState::Offline);
        assert_eq!(session.liveness(), LivenessState::Offline);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_url_is_offline_without_network() {
        let transport = MockTransport::new();
        let session = SessionContext::new();
        let monitor = ConnectivityMonitor::new(session.clone(), client(&transport, None));

        assert_eq!(monitor.probe_once().await, LivenessState::Offline);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_reprobes_and_recovers() {
        let transport = MockTransport::new()
            .on("/", MockReply::refused())
            .on("/", MockReply::status(200));
        let session = SessionContext::new();
        let mut liveness = session.watch_liveness();

        let handle = ConnectivityMonitor::new(session.clone(), client(&transport, Some("http://h")))
            .with_interval(Duration::from_secs(15))
            .spawn();

        liveness.wait_for(|s| *s == LivenessState::Offline).await.unwrap();
        assert_eq!(transport.call_count(), 1);

        liveness.wait_for(|s| *s == LivenessState::Online).await.unwrap();
        assert_eq!(transport.call_count(), 2);

        session.close();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_when_session_closes() {
        let transport = MockTransport::new().on("/", MockReply::status(200));
        let session = SessionContext::new();

        let handle = ConnectivityMonitor::new(session.clone(), client(&transport, Some("http://h"))).spawn();
        tokio::time::sleep(Duration::from_secs(31)).await;
        session.close();
        handle.await.unwrap();

        let probes = transport.call_count();
        assert_eq!(probes, 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.call_count(), probes);
    }
}
