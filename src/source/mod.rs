//! Build status sources.
//!
//! A [`SourceConnector`] opens a fresh [`BuildStatusSource`] for every
//! session; the source is dropped when the session ends.

#[cfg(test)]
pub(crate) mod fake;
mod jenkins;

pub use jenkins::{JenkinsClient, JenkinsConnector};

use std::collections::HashSet;

use async_trait::async_trait;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::status::{JobName, JobStatus};

/// A connected CI server.
#[async_trait]
pub trait BuildStatusSource: Send + Sync {
    /// Lists the names of all jobs the server knows.
    async fn list_jobs(&self) -> Result<HashSet<JobName>>;

    /// Fetches the latest build of `name`.
    ///
    /// Returns [`Error::NoBuildHistory`](crate::Error::NoBuildHistory) if
    /// the job has never been built.
    async fn job_status(&self, name: &str) -> Result<JobStatus>;
}

/// Opens connections to a CI server.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// The type of source this connector opens.
    type Source: BuildStatusSource;

    /// Connects and performs any handshake the server requires.
    async fn connect(&self, server: &ServerConfig) -> Result<Self::Source>;
}
