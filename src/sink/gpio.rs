//! Linux sysfs GPIO output driver.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::OutputsConfig;
use crate::error::{Error, Result};

use super::{AlertSink, Output};

/// Drives the two outputs through `/sys/class/gpio`.
///
/// Lamp boards for this use are usually wired active-low: pulling the pin
/// low switches the lamp on.
#[derive(Debug)]
pub struct GpioSink {
    root: PathBuf,
    alert_pin: u32,
    building_pin: u32,
    active_low: bool,
}

impl GpioSink {
    /// Exports both pins as outputs and leaves them switched off.
    pub fn provision(config: &OutputsConfig) -> Result<Self> {
        let sink = Self {
            root: config.sysfs_root.clone(),
            alert_pin: config.alert_pin,
            building_pin: config.building_pin,
            active_low: config.active_low,
        };

        for (output, pin) in sink.pins() {
            sink.export(output, pin)?;
        }

        tracing::info!(
            alert_pin = sink.alert_pin,
            building_pin = sink.building_pin,
            active_low = sink.active_low,
            "GPIO initialized"
        );
        Ok(sink)
    }

    /// Provisions the pins, trying again every `retry` until it works.
    ///
    /// Sysfs may not be ready yet right after boot. Returns `None` if
    /// shutdown is requested first.
    pub async fn provision_when_ready(
        config: &OutputsConfig,
        retry: Duration,
        shutdown: &CancellationToken,
    ) -> Option<Self> {
        loop {
            match Self::provision(config) {
                Ok(sink) => return Some(sink),
                Err(e) => tracing::warn!(
                    error = %e,
                    retry_secs = retry.as_secs(),
                    "GPIO not ready, retrying"
                ),
            }
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = tokio::time::sleep(retry) => {}
            }
        }
    }

    fn pins(&self) -> [(Output, u32); 2] {
        [
            (Output::Alert, self.alert_pin),
            (Output::Building, self.building_pin),
        ]
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    /// Returns the sysfs level for a logical output state.
    fn level(&self, on: bool) -> &'static str {
        if on != self.active_low {
            "1"
        } else {
            "0"
        }
    }

    fn export(&self, output: Output, pin: u32) -> Result<()> {
        if !self.pin_dir(pin).exists() {
            write_attr(&self.root.join("export"), &pin.to_string(), output)?;
        }
        // "high"/"low" set direction and initial level in one step, so the
        // lamp never flashes during provisioning.
        let initial = if self.active_low { "high" } else { "low" };
        write_attr(&self.pin_dir(pin).join("direction"), initial, output)
    }

    fn write(&self, output: Output, on: bool) -> Result<()> {
        let pin = match output {
            Output::Alert => self.alert_pin,
            Output::Building => self.building_pin,
        };
        tracing::debug!(output = %output, pin, on, "writing GPIO value");
        write_attr(&self.pin_dir(pin).join("value"), self.level(on), output)
    }
}

impl AlertSink for GpioSink {
    fn set_alert(&self, on: bool) -> Result<()> {
        self.write(Output::Alert, on)
    }

    fn set_building(&self, on: bool) -> Result<()> {
        self.write(Output::Building, on)
    }

    fn release_all(&self) -> Result<()> {
        tracing::info!("shutting down GPIO");
        let mut first_error = None;

        for (output, pin) in self.pins() {
            let result = self
                .write(output, false)
                .and_then(|()| write_attr(&self.root.join("unexport"), &pin.to_string(), output));
            if let Err(e) = result {
                tracing::error!(output = %output, pin, error = %e, "failed to release pin");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("GPIO shut down");
                Ok(())
            }
        }
    }
}

fn write_attr(path: &Path, value: &str, output: Output) -> Result<()> {
    fs::write(path, value).map_err(|e| Error::Device {
        output,
        reason: format!("{}: {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &Path, active_low: bool) -> OutputsConfig {
        OutputsConfig {
            sysfs_root: root.to_path_buf(),
            alert_pin: 17,
            building_pin: 18,
            active_low,
            ..OutputsConfig::default()
        }
    }

    /// Fakes a sysfs tree where both pins are already exported.
    fn fake_sysfs() -> TempDir {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::create_dir(dir.path().join("gpio17")).unwrap();
        fs::create_dir(dir.path().join("gpio18")).unwrap();
        dir
    }

    fn read(dir: &TempDir, rel: &str) -> String {
        fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn provision_sets_direction_to_inactive_level() {
        let dir = fake_sysfs();
        GpioSink::provision(&config(dir.path(), true)).unwrap();

        assert_eq!(read(&dir, "gpio17/direction"), "high");
        assert_eq!(read(&dir, "gpio18/direction"), "high");
        assert!(!dir.path().join("export").exists());
    }

    #[test]
    fn provision_exports_missing_pins() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gpio18")).unwrap();

        // gpio17 does not exist, so export is attempted and direction fails.
        let err = GpioSink::provision(&config(dir.path(), true)).unwrap_err();

        assert_eq!(read(&dir, "export"), "17");
        assert!(matches!(
            err,
            Error::Device {
                output: Output::Alert,
                ..
            }
        ));
    }

    #[test]
    fn active_low_inverts_levels() {
        let dir = fake_sysfs();
        let sink = GpioSink::provision(&config(dir.path(), true)).unwrap();

        sink.set_alert(true).unwrap();
        sink.set_building(false).unwrap();

        assert_eq!(read(&dir, "gpio17/value"), "0");
        assert_eq!(read(&dir, "gpio18/value"), "1");
    }

    #[test]
    fn active_high_writes_levels_directly() {
        let dir = fake_sysfs();
        let sink = GpioSink::provision(&config(dir.path(), false)).unwrap();

        sink.set_alert(true).unwrap();
        sink.set_building(true).unwrap();

        assert_eq!(read(&dir, "gpio17/direction"), "low");
        assert_eq!(read(&dir, "gpio17/value"), "1");
        assert_eq!(read(&dir, "gpio18/value"), "1");
    }

    #[test]
    fn release_clears_outputs_and_unexports() {
        let dir = fake_sysfs();
        let sink = GpioSink::provision(&config(dir.path(), true)).unwrap();
        sink.set_alert(true).unwrap();
        sink.set_building(true).unwrap();

        sink.release_all().unwrap();

        assert_eq!(read(&dir, "gpio17/value"), "1");
        assert_eq!(read(&dir, "gpio18/value"), "1");
        // The fake unexport file is overwritten per pin.
        assert_eq!(read(&dir, "unexport"), "18");
    }

    #[tokio::test(start_paused = true)]
    async fn provisioning_is_retried_until_sysfs_appears() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("gpio");
        let late_root = root.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            fs::create_dir_all(late_root.join("gpio17")).unwrap();
            fs::create_dir_all(late_root.join("gpio18")).unwrap();
        });

        let start = tokio::time::Instant::now();
        let sink = GpioSink::provision_when_ready(
            &config(&root, true),
            Duration::from_secs(30),
            &CancellationToken::new(),
        )
        .await;

        assert!(sink.is_some());
        // Attempts at 0s and 30s fail, the one at 60s succeeds.
        assert_eq!(start.elapsed().as_secs(), 60);
        assert_eq!(fs::read_to_string(root.join("gpio17/direction")).unwrap(), "high");
    }

    #[tokio::test(start_paused = true)]
    async fn provisioning_retry_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });

        let sink = GpioSink::provision_when_ready(
            &config(&dir.path().join("missing"), true),
            Duration::from_secs(30),
            &shutdown,
        )
        .await;

        assert!(sink.is_none());
    }

    #[test]
    fn write_failure_reports_device_error() {
        let dir = fake_sysfs();
        let sink = GpioSink::provision(&config(dir.path(), true)).unwrap();
        fs::remove_dir_all(dir.path().join("gpio18")).unwrap();

        let err = sink.set_building(true).unwrap_err();
        assert!(matches!(
            err,
            Error::Device {
                output: Output::Building,
                ..
            }
        ));
        assert!(sink.set_alert(true).is_ok());
    }
}
