//! Relay assembly and lifecycle.
//!
//! # Responsibilities
//! - Validate configuration and build every subsystem at startup
//! - Run the accept loop, spawning one handler task per connection
//! - Expose a handle for graceful stop with bounded drain
//!
//! # Design Decisions
//! - Startup is fail-fast: a bad bind address, unusable TLS material, or an
//!   unparsable target address aborts `start` before any socket is accepted.
//! - The accept loop holds the listener and owns every connection task;
//!   `stop` broadcasts the drain signal, waits out the drain timeout, and
//!   only then forces the stragglers closed through the second shutdown
//!   phase.

mod handler;

pub use handler::ConnectionContext;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::auth::{KeySet, SharedKeySet, TokenValidator};
use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::error::{StartupError, TransportError};
use crate::lifecycle::Shutdown;
use crate::net::{tls, ConnectionTracker, Listener};
use crate::protocol::Codec;
use crate::resilience::RetryPolicy;
use crate::routing::{Forwarder, HealthProbe, Router};

/// The relay itself. Constructed and started in one step.
pub struct ProxyServer;

impl ProxyServer {
    /// Validate the configuration, bind the listener, and start serving.
    ///
    /// Returns a handle the host uses to stop the relay; dropping the handle
    /// leaves the relay running until the runtime shuts down.
    pub async fn start(config: ProxyConfig) -> Result<ProxyHandle, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let key_set = KeySet::from_config(&config.auth)?;
        let keys = Arc::new(SharedKeySet::new(key_set));
        let validator = TokenValidator::new(Arc::clone(&keys));

        let acceptor = config.tls.as_ref().map(tls::build_acceptor).transpose()?;
        let connector = match config.tls.as_ref().and_then(|t| t.trusted_ca_bundle.as_ref()) {
            Some(bundle) => Some(tls::build_connector(Path::new(bundle))?),
            None => None,
        };

        let codec = Codec::new(config.limits.max_payload_bytes);
        let forwarder = Arc::new(Forwarder::new(codec.clone(), connector, &config.timeouts));
        let router = Arc::new(Router::new(
            &config.targets,
            &config.routing,
            RetryPolicy::from_config(&config.retries),
            config.health.clone(),
            forwarder,
        )?);

        let listener = Listener::bind(&config.listener).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartupError::Bind {
                addr: config.listener.bind_address.clone(),
                source,
            })?;

        let shutdown = Arc::new(Shutdown::new());
        let tracker = ConnectionTracker::new();

        let probe = HealthProbe::new(Arc::clone(&router), config.health.clone(), &config.timeouts);
        tokio::spawn(probe.run(shutdown.subscribe()));

        let ctx = Arc::new(ConnectionContext {
            codec,
            validator,
            router,
            auth: config.auth.clone(),
            idle_timeout: Duration::from_millis(config.timeouts.idle_timeout_ms),
        });

        let accept_task = tokio::spawn(accept_loop(
            listener,
            acceptor,
            ctx,
            Arc::clone(&shutdown),
            tracker.clone(),
            Duration::from_millis(config.timeouts.handshake_timeout_ms),
        ));

        tracing::info!(
            address = %local_addr,
            targets = config.targets.len(),
            tls = config.tls.is_some(),
            "Relay started"
        );

        Ok(ProxyHandle {
            shutdown,
            tracker,
            local_addr,
            drain_timeout: Duration::from_millis(config.timeouts.drain_timeout_ms),
            accept_task,
        })
    }
}

/// Handle to a running relay.
pub struct ProxyHandle {
    shutdown: Arc<Shutdown>,
    tracker: ConnectionTracker,
    local_addr: std::net::SocketAddr,
    drain_timeout: Duration,
    accept_task: JoinHandle<()>,
}

impl ProxyHandle {
    /// The address the listener actually bound, useful with port 0.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Live client connections.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop the relay: no new connections, in-flight work drains, and the
    /// drain timeout bounds how long stragglers may hold the stop. Any
    /// connection still alive when the timeout elapses is forced closed.
    pub async fn stop(self) {
        tracing::info!("Stop requested, draining connections");
        self.shutdown.trigger();

        if timeout(self.drain_timeout, self.tracker.wait_for_drain())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timeout elapsed, forcing close"
            );
            self.shutdown.force();
        }

        let _ = self.accept_task.await;
        tracing::info!("Relay stopped");
    }
}

async fn accept_loop(
    listener: Listener,
    acceptor: Option<tokio_rustls::TlsAcceptor>,
    ctx: Arc<ConnectionContext>,
    shutdown: Arc<Shutdown>,
    tracker: ConnectionTracker,
    handshake_timeout: Duration,
) {
    let mut shutdown_rx = shutdown.subscribe();
    // Subscribed up front so a force sent during the accept phase is not
    // missed by the drain phase below.
    let mut force_rx = shutdown.subscribe_force();
    let mut conns = JoinSet::new();

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            Some(_) = conns.join_next(), if !conns.is_empty() => continue,
            _ = shutdown_rx.recv() => break,
        };

        let (stream, peer, permit) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                continue;
            }
        };

        let guard = tracker.track();
        let ctx = Arc::clone(&ctx);
        let acceptor = acceptor.clone();
        let conn_shutdown = shutdown.subscribe();

        conns.spawn(async move {
            let _permit = permit;
            let id = guard.id();
            tracing::debug!(connection_id = %id, peer_addr = %peer, "Connection opened");

            match acceptor {
                Some(acceptor) => match timeout(handshake_timeout, acceptor.accept(stream)).await {
                    Ok(Ok(tls_stream)) => {
                        handler::drive(&ctx, &guard, tls_stream, conn_shutdown).await;
                    }
                    Ok(Err(e)) => {
                        let error = TransportError::Handshake(e.to_string());
                        tracing::warn!(connection_id = %id, error = %error, "Connection rejected");
                    }
                    Err(_) => {
                        let error = TransportError::Timeout(handshake_timeout);
                        tracing::warn!(connection_id = %id, error = %error, "Connection rejected");
                    }
                },
                None => handler::drive(&ctx, &guard, stream, conn_shutdown).await,
            }
        });
    }

    // Drain phase: connections observed the drain signal and finish their
    // in-flight work. A forced stop aborts whatever is still running, which
    // drops each task's connection guard and permit.
    loop {
        tokio::select! {
            joined = conns.join_next() => {
                if joined.is_none() {
                    break;
                }
            }
            _ = force_rx.recv() => {
                tracing::warn!(remaining = conns.len(), "Aborting connections");
                conns.abort_all();
                while conns.join_next().await.is_some() {}
                break;
            }
        }
    }

    tracing::info!("Accept loop stopped");
}
