//! Output driver that only logs, for hosts without GPIO.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

use super::{AlertSink, Output};

/// Logs output changes instead of driving hardware.
#[derive(Debug, Default)]
pub struct LogSink {
    alert: AtomicBool,
    building: AtomicBool,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last state written to `output`.
    pub fn is_on(&self, output: Output) -> bool {
        self.slot(output).load(Ordering::Acquire)
    }

    fn slot(&self, output: Output) -> &AtomicBool {
        match output {
            Output::Alert => &self.alert,
            Output::Building => &self.building,
        }
    }

    fn set(&self, output: Output, on: bool) {
        let was = self.slot(output).swap(on, Ordering::AcqRel);
        if was != on {
            tracing::info!(output = %output, on, "output switched");
        }
    }
}

impl AlertSink for LogSink {
    fn set_alert(&self, on: bool) -> Result<()> {
        self.set(Output::Alert, on);
        Ok(())
    }

    fn set_building(&self, on: bool) -> Result<()> {
        self.set(Output::Building, on);
        Ok(())
    }

    fn release_all(&self) -> Result<()> {
        self.set(Output::Alert, false);
        self.set(Output::Building, false);
        tracing::info!("outputs released");
        Ok(())
    }
}
