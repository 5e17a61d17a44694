//! Heartbeater speaking JSON over HTTP to the coordinating server.
//!
//! Options:
//! - `server_base_url` (required)
//! - `username`, `password`: basic auth, enabled when either is set
//! - `timeout_seconds`: per-request timeout, default 30
//!
//! Endpoints, relative to the base url:
//!
//! | call              | request                                     |
//! |-------------------|---------------------------------------------|
//! | register          | `POST workers/register` `{hostname}`        |
//! | heartbeat         | `POST workers/{id}/heartbeat` `{job_id}`    |
//! | signal_start      | `POST jobs/{job}/start`                     |
//! | signal_completion | `POST jobs/{job}/complete` completion report |
//! | unregister        | `POST workers/{id}/unregister`              |
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use relay_core::backend::{BackendError, Heartbeater, WorkerSlot};
use relay_model::{BackendOptions, CompletionReport, JobId, ModelError, WorkerId};
use reqwest::{RequestBuilder, Response, Url};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::TransportError;

pub struct HttpHeartbeater {
    client: reqwest::Client,
    base: Url,
    auth: Option<(String, Option<String>)>,
    slot: WorkerSlot,
}

impl HttpHeartbeater {
    pub const NAME: &'static str = "http";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base: Url, timeout: Duration) -> Result<Self, TransportError> {
        if base.cannot_be_a_base() {
            return Err(TransportError::BaseUrl(base.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            auth: None,
            slot: WorkerSlot::default(),
        })
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.auth = Some((username.into(), password));
        self
    }

    /// Continue as an already registered worker.
    pub fn registered_as(self, id: WorkerId) -> Self {
        self.slot.set(id);
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::BaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Response, TransportError> {
        let req = self.client.post(url.clone()).json(body);
        self.send(url, req).await
    }

    async fn post_empty(&self, url: Url) -> Result<Response, TransportError> {
        let req = self.client.post(url.clone());
        self.send(url, req).await
    }

    async fn send(&self, url: Url, mut req: RequestBuilder) -> Result<Response, TransportError> {
        if let Some((user, pass)) = &self.auth {
            req = req.basic_auth(user, pass.as_ref());
        }
        let res = req.send().await?;
        let status = res.status();
        debug!(%url, %status, "server answered");
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(res)
    }
}

#[async_trait]
impl Heartbeater for HttpHeartbeater {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn worker_id(&self) -> Option<WorkerId> {
        self.slot.get()
    }

    async fn register(&self) -> Result<WorkerId, BackendError> {
        self.slot.ensure_vacant()?;
        let hostname = hostname::get()
            .map_err(TransportError::Hostname)?
            .to_string_lossy()
            .into_owned();
        info!(%hostname, server = %self.base, "registering with server");

        let url = self.endpoint(&["workers", "register"])?;
        let body: Value = self
            .post_json(url, &json!({ "hostname": hostname }))
            .await?
            .json()
            .await
            .map_err(TransportError::Http)?;

        let id = parse_worker_id(&body).ok_or(TransportError::MissingWorkerId)?;
        self.slot.set(id);
        Ok(id)
    }

    async fn heartbeat(&self, job: Option<&JobId>) -> Result<(), BackendError> {
        let id = self.slot.require()?;
        let url = self.endpoint(&["workers", &id.to_string(), "heartbeat"])?;
        self.post_json(url, &json!({ "job_id": job })).await?;
        Ok(())
    }

    async fn signal_start(&self, job: &JobId) -> Result<(), BackendError> {
        self.slot.require()?;
        info!(job_id = %job, "signalling start to server");
        let url = self.endpoint(&["jobs", job.as_str(), "start"])?;
        self.post_empty(url).await?;
        Ok(())
    }

    async fn signal_completion(
        &self,
        job: &JobId,
        report: &CompletionReport,
    ) -> Result<(), BackendError> {
        self.slot.require()?;
        info!(job_id = %job, "signalling completion to server");
        let url = self.endpoint(&["jobs", job.as_str(), "complete"])?;
        self.post_json(url, report.as_map()).await?;
        Ok(())
    }

    async fn unregister(&self) -> Result<(), BackendError> {
        let id = self.slot.require()?;
        info!(worker_id = %id, "unregistering with server");
        let url = self.endpoint(&["workers", &id.to_string(), "unregister"])?;
        self.post_empty(url).await?;
        self.slot.clear();
        Ok(())
    }
}

/// `worker_id` as a number or a numeric string.
fn parse_worker_id(body: &Value) -> Option<WorkerId> {
    match body.get("worker_id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .map(WorkerId::new)
}

pub(crate) fn create(
    opts: &BackendOptions,
    previous: Option<&Arc<dyn Heartbeater>>,
) -> Result<Arc<dyn Heartbeater>, BackendError> {
    let raw = opts.require_str("server_base_url")?;
    let base = Url::parse(raw).map_err(|e| ModelError::InvalidOption {
        key: "server_base_url".into(),
        reason: e.to_string(),
    })?;
    let timeout = opts
        .get_u64("timeout_seconds")?
        .map(Duration::from_secs)
        .unwrap_or(HttpHeartbeater::DEFAULT_TIMEOUT);

    let mut hb = HttpHeartbeater::new(base, timeout)?;
    let username = opts.get_str("username")?;
    let password = opts.get_str("password")?;
    if username.is_some() || password.is_some() {
        hb = hb.with_basic_auth(username.unwrap_or_default(), password.map(str::to_string));
    }
    if let Some(id) = previous.and_then(|p| p.worker_id()) {
        hb = hb.registered_as(id);
    }
    let hb: Arc<dyn Heartbeater> = Arc::new(hb);
    Ok(hb)
}
