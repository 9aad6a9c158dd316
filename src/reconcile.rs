//! The status-reconciliation loop.
//!
//! One [`ReconciliationLoop::run`] call is one session:
//! `Connecting -> Listing -> Polling (repeats) -> Terminated`.
//!
//! Failures while connecting or listing end the session. Failures of a
//! single job while polling only drop that job from the current cycle.
//! Whenever a session terminates, both outputs are forced off before
//! control returns to the caller, so the lamps never show data older than
//! the failed attempt.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::monitor::{SessionMonitor, SessionSummary};
use crate::sink::{self, AlertSink};
use crate::source::{BuildStatusSource, SourceConnector};
use crate::status::{self, AlertState, JobName, JobResolution, SkipReason};

/// Phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Listing,
    Polling,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::Listing => "listing",
            SessionState::Polling => "polling",
            SessionState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Why a session ended on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The configuration could not be loaded.
    Config(String),
    /// Connecting or the handshake failed.
    Connect(String),
    /// The initial job listing failed.
    Listing(String),
    /// Every status request failed for too many cycles in a row.
    StaleSession { failed_cycles: u32 },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Config(reason) => write!(f, "configuration failed: {reason}"),
            TerminationReason::Connect(reason) => write!(f, "could not connect: {reason}"),
            TerminationReason::Listing(reason) => write!(f, "could not retrieve jobs: {reason}"),
            TerminationReason::StaleSession { failed_cycles } => {
                write!(f, "all status requests failed for {failed_cycles} cycles")
            }
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested. Outputs are left to the caller.
    Shutdown,
    /// The session failed. Outputs have been forced off.
    Terminated {
        reason: TerminationReason,
        /// Polling cycles completed before the failure.
        cycles: u64,
    },
}

/// Result of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Outputs were driven with this state.
    Completed(AlertState),
    /// The session must be rebuilt.
    SessionFatal(TerminationReason),
}

/// A connected source and the jobs it reported when the session started.
pub struct Session<Src> {
    source: Src,
    listed: HashSet<JobName>,
}

impl<Src: BuildStatusSource> Session<Src> {
    pub fn new(source: Src, listed: HashSet<JobName>) -> Self {
        Self { source, listed }
    }

    /// Looks up one job. Never fails; failures become skip reasons.
    pub async fn resolve(&self, name: &str) -> JobResolution {
        if !self.listed.contains(name) {
            return JobResolution::Skipped(SkipReason::NotListed);
        }

        tracing::debug!(job = %name, "checking job");
        match self.source.job_status(name).await {
            Ok(status) => JobResolution::Resolved(status),
            Err(e) => {
                let reason = SkipReason::from(&e);
                match reason {
                    SkipReason::NoBuildHistory => {
                        tracing::debug!(job = %name, "job has no completed build, skipping")
                    }
                    _ => tracing::warn!(job = %name, error = %e, "could not get job status"),
                }
                JobResolution::Skipped(reason)
            }
        }
    }

    /// Resolves every distinct name once, in order.
    pub async fn snapshot(&self, jobs: &[JobName]) -> HashMap<JobName, JobResolution> {
        let mut resolved = HashMap::with_capacity(jobs.len());
        for name in jobs {
            if !resolved.contains_key(name) {
                let resolution = self.resolve(name).await;
                resolved.insert(name.clone(), resolution);
            }
        }
        resolved
    }
}

/// Runs monitoring sessions against one configuration.
pub struct ReconciliationLoop<'a, C, S: ?Sized> {
    connector: &'a C,
    sink: &'a S,
    config: &'a MonitorConfig,
    shutdown: CancellationToken,
}

impl<'a, C, S> ReconciliationLoop<'a, C, S>
where
    C: SourceConnector,
    S: AlertSink + ?Sized,
{
    pub fn new(
        connector: &'a C,
        sink: &'a S,
        config: &'a MonitorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            connector,
            sink,
            config,
            shutdown,
        }
    }

    /// Runs one session until it fails or shutdown is requested.
    pub async fn run(&self) -> SessionEnd {
        tracing::debug!(state = %SessionState::Connecting, "session state");
        let source = match self.connector.connect(&self.config.server).await {
            Ok(source) => source,
            Err(e) => return self.terminate(TerminationReason::Connect(e.to_string()), None),
        };

        tracing::debug!(state = %SessionState::Listing, "session state");
        let listed = match source.list_jobs().await {
            Ok(listed) => listed,
            Err(e) => return self.terminate(TerminationReason::Listing(e.to_string()), None),
        };
        for name in &self.config.jobs {
            if !listed.contains(name) {
                tracing::warn!(job = %name, "configured job not found on server");
            }
        }

        let session = Session::new(source, listed);
        let mut monitor = SessionMonitor::new(self.config.reconnect_after_failed_cycles);
        tracing::debug!(state = %SessionState::Polling, "session state");

        loop {
            match self.cycle(&session, &mut monitor).await {
                CycleOutcome::Completed(_) => {}
                CycleOutcome::SessionFatal(reason) => {
                    return self.terminate(reason, Some(&monitor));
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(
                        summary = ?SessionSummary::from(&monitor),
                        "session stopped by shutdown"
                    );
                    return SessionEnd::Shutdown;
                }
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }
    }

    /// Fetches one snapshot, reduces it and drives the outputs.
    pub async fn cycle(
        &self,
        session: &Session<C::Source>,
        monitor: &mut SessionMonitor,
    ) -> CycleOutcome {
        tracing::debug!("checking status");
        let snapshot = session.snapshot(&self.config.jobs).await;

        let state = status::reduce(&self.config.jobs, |name| {
            snapshot
                .get(name)
                .cloned()
                .unwrap_or(JobResolution::Skipped(SkipReason::NotListed))
        });

        sink::drive(self.sink, state);
        if state.has_errors {
            tracing::warn!(building = state.is_building, "alert turned on");
        } else {
            tracing::info!(building = state.is_building, "no failing jobs");
        }

        monitor.record_cycle(snapshot.values());
        if monitor.is_stale() {
            return CycleOutcome::SessionFatal(TerminationReason::StaleSession {
                failed_cycles: monitor.failed_streak(),
            });
        }
        CycleOutcome::Completed(state)
    }

    fn terminate(
        &self,
        reason: TerminationReason,
        monitor: Option<&SessionMonitor>,
    ) -> SessionEnd {
        let cycles = monitor.map_or(0, SessionMonitor::cycles);
        tracing::error!(
            reason = %reason,
            cycles,
            state = %SessionState::Terminated,
            "session terminated"
        );
        sink::drive_safe_state(self.sink);
        SessionEnd::Terminated { reason, cycles }
    }
}
