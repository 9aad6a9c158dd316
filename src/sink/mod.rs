//! Physical indicator outputs.
//!
//! An [`AlertSink`] owns the two binary outputs. Writes are best-effort: a
//! failed write is logged and the next cycle drives the same output again.

mod dry_run;
mod gpio;

pub use dry_run::LogSink;
pub use gpio::GpioSink;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::status::AlertState;

/// One of the two indicator outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    /// Lit while any watched job is failing.
    Alert,
    /// Lit while any watched job is building.
    Building,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Alert => f.write_str("alert"),
            Output::Building => f.write_str("building"),
        }
    }
}

/// Owner of the two indicator outputs.
pub trait AlertSink: Send + Sync {
    /// Switches the alert output.
    fn set_alert(&self, on: bool) -> Result<()>;

    /// Switches the building output.
    fn set_building(&self, on: bool) -> Result<()>;

    /// Clears both outputs and releases the underlying device.
    ///
    /// Called once, on shutdown. No writes follow it.
    fn release_all(&self) -> Result<()>;
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn set_alert(&self, on: bool) -> Result<()> {
        (**self).set_alert(on)
    }

    fn set_building(&self, on: bool) -> Result<()> {
        (**self).set_building(on)
    }

    fn release_all(&self) -> Result<()> {
        (**self).release_all()
    }
}

impl<S: AlertSink + ?Sized> AlertSink for Arc<S> {
    fn set_alert(&self, on: bool) -> Result<()> {
        (**self).set_alert(on)
    }

    fn set_building(&self, on: bool) -> Result<()> {
        (**self).set_building(on)
    }

    fn release_all(&self) -> Result<()> {
        (**self).release_all()
    }
}

/// Writes both signals of `state` to the sink.
///
/// Both outputs are always written, even when unchanged. A failure on one
/// output is logged and does not prevent the write to the other.
pub fn drive<S: AlertSink + ?Sized>(sink: &S, state: AlertState) {
    if let Err(e) = sink.set_alert(state.has_errors) {
        tracing::error!(error = %e, "failed to drive alert output");
    }
    if let Err(e) = sink.set_building(state.is_building) {
        tracing::error!(error = %e, "failed to drive building output");
    }
}

/// Forces both outputs off.
pub fn drive_safe_state<S: AlertSink + ?Sized>(sink: &S) {
    tracing::info!("forcing outputs to safe state");
    drive(sink, AlertState::SAFE);
}

/// Owns a sink and releases it when dropped.
///
/// Release runs exactly once, on normal return as well as while unwinding
/// from a panic.
pub struct ReleaseOnDrop<S: AlertSink> {
    sink: S,
}

impl<S: AlertSink> ReleaseOnDrop<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: AlertSink> Drop for ReleaseOnDrop<S> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("releasing outputs after a panic");
        } else {
            tracing::info!("releasing outputs");
        }
        if let Err(e) = self.sink.release_all() {
            tracing::error!(error = %e, "failed to release outputs");
        }
    }
}
