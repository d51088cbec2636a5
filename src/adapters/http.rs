//! REST Cluster Adapter
//!
//! Implements the `ClusterClient` port against the cluster's JSON admin API:
//!
//! - `GET/PUT /v1/buckets/{bucket}/replication` - rule set
//! - `GET /v1/buckets/{bucket}/targets?service=` - remote target list
//! - `PUT /v1/buckets/{bucket}/targets` - target upsert, answers the ARN
//! - `DELETE /v1/buckets/{bucket}/targets/{arn}` - target removal
//!
//! Requests carry a bearer token; timeouts are client-wide. Refusals are
//! surfaced verbatim as `RemoteRejected` with the offending bucket in the
//! context; the engine never retries on its own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

use crate::domain::ports::{ClusterClient, RemoteConfig, RemoteTarget, TargetDescriptor};
use crate::error::{Error, Result};

/// Default timeout applied to every admin call.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON admin API client for a live cluster.
pub struct RestClusterClient {
    http: Client,
    endpoint: String,
    token: String,
}

#[derive(Deserialize)]
struct UpsertResponse {
    arn: String,
}

impl RestClusterClient {
    /// Create a client with the default call timeout.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, token, DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn bucket_url(&self, bucket: &str, suffix: &str) -> String {
        format!(
            "{}/v1/buckets/{}/{}",
            self.endpoint,
            urlencoding::encode(bucket),
            suffix
        )
    }

    async fn send(&self, request: RequestBuilder, context: String) -> Result<Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::RemoteRejected {
                context: context.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteRejected {
                context,
                reason: format!("{}: {}", status, body.trim()),
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for RestClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClusterClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl ClusterClient for RestClusterClient {
    async fn get_replication_config(&self, bucket: &str) -> Result<RemoteConfig> {
        let url = self.bucket_url(bucket, "replication");
        debug!(%url, "fetching replication configuration");

        let response = self
            .send(
                self.http.get(&url),
                format!("reading replication configuration for bucket {:?}", bucket),
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| Error::ResponseParse(e.to_string()))
    }

    async fn set_replication_config(&self, bucket: &str, config: &RemoteConfig) -> Result<()> {
        let url = self.bucket_url(bucket, "replication");
        debug!(%url, rules = config.rules.len(), "submitting replication configuration");

        self.send(
            self.http.put(&url).json(config),
            format!("writing replication configuration for bucket {:?}", bucket),
        )
        .await?;
        Ok(())
    }

    async fn list_remote_targets(&self, bucket: &str, service: &str) -> Result<Vec<RemoteTarget>> {
        let url = self.bucket_url(bucket, "targets");
        debug!(%url, service, "listing remote targets");

        let response = self
            .send(
                self.http.get(&url).query(&[("service", service)]),
                format!("listing remote targets for bucket {:?}", bucket),
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| Error::ResponseParse(e.to_string()))
    }

    async fn upsert_remote_target(
        &self,
        bucket: &str,
        descriptor: &TargetDescriptor,
    ) -> Result<String> {
        let url = self.bucket_url(bucket, "targets");
        debug!(%url, path = %descriptor.target_bucket, "upserting remote target");

        let response = self
            .send(
                self.http.put(&url).json(descriptor),
                format!("configuring remote target for bucket {:?}", bucket),
            )
            .await?;
        let upsert: UpsertResponse = response
            .json()
            .await
            .map_err(|e| Error::ResponseParse(e.to_string()))?;
        Ok(upsert.arn)
    }

    async fn remove_remote_target(&self, bucket: &str, arn: &str) -> Result<()> {
        let url = self.bucket_url(bucket, &format!("targets/{}", urlencoding::encode(arn)));
        debug!(%url, "removing remote target");

        self.send(
            self.http.delete(&url),
            format!("removing remote target for bucket {:?}", bucket),
        )
        .await?;
        Ok(())
    }
}
