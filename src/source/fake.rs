//! Scripted CI server used by the loop and supervisor tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::status::{JobName, JobStatus};

use super::{BuildStatusSource, SourceConnector};

/// How a scripted status request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Transport,
    NoHistory,
}

#[derive(Debug, Default)]
pub struct FakeCi {
    pub connect_error: Option<String>,
    /// Panic inside `connect`, as a bug in a client library would.
    pub panic_on_connect: bool,
    pub listing_error: Option<String>,
    pub listed: Vec<JobName>,
    pub statuses: HashMap<JobName, std::result::Result<JobStatus, FakeFailure>>,
    /// How long every status request stays pending before answering.
    pub status_delay: Option<Duration>,
    /// Time of every connect attempt.
    pub connects: Vec<Instant>,
    /// Every status request, in order.
    pub status_requests: Vec<JobName>,
}

impl FakeCi {
    /// A server listing exactly `statuses`.
    pub fn with_jobs(statuses: Vec<JobStatus>) -> Self {
        let mut ci = Self::default();
        for status in statuses {
            ci.listed.push(status.name.clone());
            ci.statuses.insert(status.name.clone(), Ok(status));
        }
        ci
    }

    pub fn unreachable() -> Self {
        Self {
            connect_error: Some("connection refused".to_string()),
            ..Self::default()
        }
    }

    /// Lists `name` but fails every status request for it.
    pub fn failing(mut self, name: &str, failure: FakeFailure) -> Self {
        self.listed.push(name.to_string());
        self.statuses.insert(name.to_string(), Err(failure));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    ci: Arc<Mutex<FakeCi>>,
}

impl FakeConnector {
    pub fn new(ci: FakeCi) -> Self {
        Self {
            ci: Arc::new(Mutex::new(ci)),
        }
    }

    /// Runs `f` against the scripted server state.
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeCi) -> R) -> R {
        f(&mut self.ci.lock().unwrap())
    }

    pub fn connect_count(&self) -> usize {
        self.with(|ci| ci.connects.len())
    }
}

pub struct FakeSource {
    ci: Arc<Mutex<FakeCi>>,
}

#[async_trait]
impl SourceConnector for FakeConnector {
    type Source = FakeSource;

    async fn connect(&self, _server: &ServerConfig) -> Result<FakeSource> {
        let mut ci = self.ci.lock().unwrap();
        ci.connects.push(Instant::now());
        if ci.panic_on_connect {
            drop(ci);
            panic!("connector crashed");
        }
        match &ci.connect_error {
            Some(reason) => Err(Error::Transport(reason.clone())),
            None => Ok(FakeSource {
                ci: Arc::clone(&self.ci),
            }),
        }
    }
}

#[async_trait]
impl BuildStatusSource for FakeSource {
    async fn list_jobs(&self) -> Result<HashSet<JobName>> {
        let ci = self.ci.lock().unwrap();
        match &ci.listing_error {
            Some(reason) => Err(Error::Transport(reason.clone())),
            None => Ok(ci.listed.iter().cloned().collect()),
        }
    }

    async fn job_status(&self, name: &str) -> Result<JobStatus> {
        let (answer, delay) = {
            let mut ci = self.ci.lock().unwrap();
            ci.status_requests.push(name.to_string());
            let answer = match ci.statuses.get(name) {
                Some(Ok(status)) => Ok(status.clone()),
                Some(Err(FakeFailure::NoHistory)) => Err(Error::NoBuildHistory(name.to_string())),
                Some(Err(FakeFailure::Transport)) | None => {
                    Err(Error::Transport(format!("request for '{name}' failed")))
                }
            };
            (answer, ci.status_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}
