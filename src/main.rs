//! Build Beacon CLI
//!
//! Usage: `build-beacon [config-path]`. Without an argument the path comes
//! from `BUILD_BEACON_CONFIG`, then `conf/build-beacon.toml` next to the
//! executable.

use std::path::PathBuf;

use build_beacon::config::{self, MonitorConfig, OutputDriver, OutputsConfig};
use build_beacon::{
    spawn_signal_listener, AlertSink, GpioSink, JenkinsConnector, LogSink, Supervisor,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = config::resolve_path(std::env::args_os().nth(1).map(PathBuf::from));
    tracing::info!(config = %config_path.display(), "build beacon started");

    let shutdown = CancellationToken::new();
    let listener = spawn_signal_listener(shutdown.clone());

    // Outputs are provisioned once; everything else is reloaded per session.
    let (outputs, retry) = match MonitorConfig::load(&config_path) {
        Ok(config) => (config.outputs.clone(), config.cooldown()),
        Err(e) => {
            tracing::error!(error = %e, "could not load configuration, using default outputs");
            let defaults = MonitorConfig::new(Default::default());
            (OutputsConfig::default(), defaults.cooldown())
        }
    };

    let sink: Box<dyn AlertSink> = match outputs.driver {
        OutputDriver::Gpio => {
            match GpioSink::provision_when_ready(&outputs, retry, &shutdown).await {
                Some(sink) => Box::new(sink),
                None => {
                    tracing::info!("build beacon closed before GPIO was ready");
                    return;
                }
            }
        }
        OutputDriver::Log => {
            tracing::info!("using log output driver");
            Box::new(LogSink::new())
        }
    };

    let supervisor = Supervisor::new(
        JenkinsConnector,
        sink,
        move || MonitorConfig::load(&config_path),
        shutdown.clone(),
    );
    let attempts = supervisor.run().await;

    shutdown.cancel();
    if let Err(e) = listener.await {
        tracing::warn!(error = %e, "signal listener ended abnormally");
    }
    tracing::info!(sessions = attempts, "build beacon closed");
}
