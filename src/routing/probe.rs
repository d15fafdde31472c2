//! Active target probing.
//!
//! # Responsibilities
//! - Periodically attempt a TCP connect to every target
//! - Feed results into the same health hysteresis live traffic uses
//!
//! Probing is what restores an unreachable target: passive marks stop once
//! dispatch refuses to send traffic there.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::{HealthConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::routing::router::Router;

pub struct HealthProbe {
    router: Arc<Router>,
    config: HealthConfig,
    connect_timeout: Duration,
}

impl HealthProbe {
    pub fn new(router: Arc<Router>, config: HealthConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            router,
            config,
            connect_timeout: Duration::from_millis(timeouts.connect_timeout_ms),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.config.probe_interval_ms,
            "Health probe starting"
        );

        let mut ticker = time::interval(Duration::from_millis(self.config.probe_interval_ms));
        // The first tick fires immediately; skip it so startup traffic is not
        // double-counted with the initial probe round.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.probe_all().await,
                _ = shutdown.recv() => {
                    tracing::info!("Health probe stopping");
                    break;
                }
            }
        }
    }

    async fn probe_all(&self) {
        for target in self.router.targets() {
            let reachable = matches!(
                time::timeout(self.connect_timeout, TcpStream::connect(target.addr())).await,
                Ok(Ok(_))
            );

            if reachable {
                target.mark_success(self.config.healthy_threshold);
            } else {
                tracing::warn!(
                    target_name = %target.name(),
                    addr = %target.addr(),
                    "Probe failed"
                );
                target.mark_failure(self.config.unreachable_threshold);
            }

            metrics::record_target_health(target.name(), !target.is_unreachable());
        }
    }
}
