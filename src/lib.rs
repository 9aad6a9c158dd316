//! Build Beacon - drives warning lights from Jenkins job results
//!
//! This library polls a Jenkins server for the last build of a configured
//! set of jobs and switches two binary outputs: an alert light that is on
//! while any job's last build failed, and a building light that is on while
//! any job is building.

pub mod backoff;
pub mod config;
pub mod error;
pub mod monitor;
pub mod reconcile;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod status;
pub mod supervisor;

pub use error::{Error, Result};
pub use monitor::{SessionMonitor, SessionSummary};
pub use reconcile::{
    CycleOutcome, ReconciliationLoop, SessionEnd, SessionState, TerminationReason,
};
pub use shutdown::{spawn_signal_listener, ShutdownSignal};
pub use sink::{AlertSink, GpioSink, LogSink, Output, ReleaseOnDrop};
pub use source::{BuildStatusSource, JenkinsClient, JenkinsConnector, SourceConnector};
pub use status::{AlertState, JobName, JobResolution, JobStatus, Outcome, SkipReason};
pub use supervisor::Supervisor;

pub use config::{
    MonitorConfig, OutputDriver, OutputsConfig, ServerConfig, Validate, ValidationResult,
};
