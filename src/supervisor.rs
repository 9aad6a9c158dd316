//! Outer retry loop around monitoring sessions.
//!
//! The supervisor reloads configuration, runs a session, waits the cooldown
//! and starts over, until shutdown is requested. The sink is released
//! exactly once when the supervisor is dropped, whether `run` returned or a
//! session panicked.

use tokio_util::sync::CancellationToken;

use crate::backoff::Cooldown;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::reconcile::{ReconciliationLoop, SessionEnd, TerminationReason};
use crate::sink::{self, AlertSink, ReleaseOnDrop};
use crate::source::SourceConnector;

/// Supervises monitoring sessions.
pub struct Supervisor<C, S: AlertSink, L> {
    connector: C,
    sink: ReleaseOnDrop<S>,
    load_config: L,
    shutdown: CancellationToken,
    cooldown: Cooldown,
}

impl<C, S, L> Supervisor<C, S, L>
where
    C: SourceConnector,
    S: AlertSink,
    L: FnMut() -> Result<MonitorConfig>,
{
    /// Creates a supervisor. `load_config` is called before every session.
    ///
    /// Until a configuration loads, the default cooldown applies.
    pub fn new(connector: C, sink: S, load_config: L, shutdown: CancellationToken) -> Self {
        let defaults = MonitorConfig::new(Default::default());
        Self {
            connector,
            sink: ReleaseOnDrop::new(sink),
            load_config,
            shutdown,
            cooldown: Cooldown::new(defaults.cooldown(), defaults.max_cooldown()),
        }
    }

    /// Runs sessions until shutdown. The outputs are released when this
    /// returns or unwinds.
    ///
    /// Returns the number of sessions attempted.
    pub async fn run(mut self) -> u64 {
        let shutdown = self.shutdown.clone();
        let mut attempts = 0u64;

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            attempts += 1;
            tracing::info!(attempt = attempts, "starting session");

            // Dropping the session future on shutdown aborts any request in
            // flight; nothing writes to the sink after this select.
            let end = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                end = self.attempt() => end,
            };

            let (reason, cycles) = match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Terminated { reason, cycles } => (reason, cycles),
            };

            let wait = if cycles > 0 {
                self.cooldown.succeeded();
                self.cooldown.current()
            } else {
                let wait = self.cooldown.current();
                self.cooldown.failed();
                wait
            };
            tracing::warn!(
                reason = %reason,
                wait_secs = wait.as_secs(),
                "session ended, trying again after cooldown"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!(sessions = attempts, "shutting down");
        attempts
    }

    /// Loads configuration and runs one session.
    async fn attempt(&mut self) -> SessionEnd {
        let config = match (self.load_config)() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "could not load configuration");
                sink::drive_safe_state(self.sink.sink());
                return SessionEnd::Terminated {
                    reason: TerminationReason::Config(e.to_string()),
                    cycles: 0,
                };
            }
        };
        self.cooldown.rebound(config.cooldown(), config.max_cooldown());

        ReconciliationLoop::new(&self.connector, self.sink.sink(), &config, self.shutdown.clone())
            .run()
            .await
    }
}
