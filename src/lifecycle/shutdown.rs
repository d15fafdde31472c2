//! Two-phase shutdown coordination.
//!
//! Stopping happens in two phases. The drain signal tells the accept loop
//! and every connection to stop taking new work and finish what is in
//! flight; the force signal fires only if the drain timeout elapses and
//! tells the accept loop to abort whatever is still running.

use tokio::sync::broadcast;

#[derive(Debug)]
pub struct Shutdown {
    drain: broadcast::Sender<()>,
    force: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (drain, _) = broadcast::channel(1);
        let (force, _) = broadcast::channel(1);
        Self { drain, force }
    }

    /// Subscribe to the drain signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.drain.subscribe()
    }

    /// Subscribe to the forced-close signal.
    pub fn subscribe_force(&self) -> broadcast::Receiver<()> {
        self.force.subscribe()
    }

    /// Begin draining. Idempotent; repeat triggers are no-ops for tasks
    /// that already observed the first.
    pub fn trigger(&self) {
        let _ = self.drain.send(());
    }

    /// Abort whatever outlived the drain. Implies `trigger`.
    pub fn force(&self) {
        let _ = self.drain.send(());
        let _ = self.force.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
