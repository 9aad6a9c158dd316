//! Jenkins JSON API client.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::{strip_userinfo, ServerConfig};
use crate::error::{Error, Result};
use crate::status::{JobName, JobStatus, Outcome};

use super::{BuildStatusSource, SourceConnector};

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LastBuild {
    /// `null` while the first build is still running.
    #[serde(default)]
    result: Option<Outcome>,
    #[serde(default)]
    building: bool,
}

/// Opens [`JenkinsClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct JenkinsConnector;

#[async_trait]
impl SourceConnector for JenkinsConnector {
    type Source = JenkinsClient;

    async fn connect(&self, server: &ServerConfig) -> Result<JenkinsClient> {
        let client = JenkinsClient::new(server)?;
        client.handshake().await?;
        Ok(client)
    }
}

/// Client for one Jenkins server.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    base: Url,
    http: reqwest::Client,
    user: Option<String>,
    password: Option<String>,
}

impl JenkinsClient {
    /// Creates a client without contacting the server.
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let mut base = Url::parse(server.address.trim())?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "server address '{}' cannot be used as a base URL",
                server.redacted_address()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(server.timeout())
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        let (user, password) = match server.credentials() {
            Some((user, password)) => (Some(user.to_string()), password.map(str::to_string)),
            None => (None, None),
        };

        Ok(Self {
            base,
            http,
            user,
            password,
        })
    }

    /// Returns the server URL with any embedded credentials removed.
    pub fn display_url(&self) -> Url {
        strip_userinfo(self.base.clone())
    }

    /// Checks that the server answers the JSON API.
    pub async fn handshake(&self) -> Result<()> {
        let url = self.endpoint(&["api", "json"], "tree=mode")?;
        let response = self.send(url).await?;
        let version = response
            .headers()
            .get("X-Jenkins")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        check_status(response.status(), "handshake")?;

        tracing::info!(
            host = %self.display_url(),
            version = %version,
            "Jenkins client initialized"
        );
        Ok(())
    }

    fn endpoint(&self, segments: &[&str], query: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config("server address cannot be used as a base URL".into()))?
            .pop_if_empty()
            .extend(segments);
        url.set_query(Some(query));
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<reqwest::Response> {
        tracing::debug!(path = %url.path(), "GET");
        let mut request = self.http.get(url);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }
        Ok(request.send().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let response = self.send(url).await?;
        check_status(response.status(), what)?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn check_status(status: StatusCode, what: &str) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Transport(format!("{what} returned HTTP {status}")))
    }
}

#[async_trait]
impl BuildStatusSource for JenkinsClient {
    async fn list_jobs(&self) -> Result<HashSet<JobName>> {
        tracing::info!("retrieving jobs");
        let url = self.endpoint(&["api", "json"], "tree=jobs[name]")?;
        let list: JobList = self.get_json(url, "job listing").await?;

        let jobs: HashSet<JobName> = list.jobs.into_iter().map(|j| j.name).collect();
        for job in &jobs {
            tracing::info!(job = %job, "found job");
        }
        Ok(jobs)
    }

    async fn job_status(&self, name: &str) -> Result<JobStatus> {
        let url = self.endpoint(
            &["job", name, "lastBuild", "api", "json"],
            "tree=result,building",
        )?;
        let response = self.send(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NoBuildHistory(name.to_string()));
        }
        check_status(response.status(), "job status")?;

        let body = response.text().await?;
        let build: LastBuild = serde_json::from_str(&body)
            .map_err(|e| Error::Data(format!("job '{name}': {e}")))?;

        Ok(JobStatus::new(
            name,
            build.result.unwrap_or_default(),
            build.building,
        ))
    }
}
