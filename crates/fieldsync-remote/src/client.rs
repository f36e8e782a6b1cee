// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote authority.
//!
//! One request per call and no internal retry: the queue processors own retry
//! accounting, so a failure here is classified and returned as-is.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldsync_config::model::RemoteConfig;
use fieldsync_core::types::{AdapterType, HealthStatus, MediaUpload, MutationRequest};
use fieldsync_core::{FieldSyncError, PluginAdapter, RemoteError, RemoteTransport};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::endpoint;

/// `reqwest`-backed [`RemoteTransport`].
///
/// Clones share the bearer token, so [`set_auth_token`](Self::set_auth_token)
/// on any clone affects every subsequent request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: Arc<RwLock<Option<String>>>,
    mutation_timeout: Duration,
    media_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &RemoteConfig) -> Result<Self, FieldSyncError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.mutation_timeout())
            .build()
            .map_err(|e| FieldSyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth_token: Arc::new(RwLock::new(config.auth_token.clone())),
            mutation_timeout: config.mutation_timeout(),
            media_timeout: config.media_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token used by later requests.
    pub async fn set_auth_token(&self, token: Option<String>) {
        let present = token.is_some();
        *self.auth_token.write().await = token;
        info!(token_present = present, "remote credentials updated");
    }

    pub async fn has_auth_token(&self) -> bool {
        self.auth_token.read().await.is_some()
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a prepared request and classify anything but a 2xx.
    async fn execute(&self, request: RequestBuilder, timeout: Duration) -> Result<(), RemoteError> {
        let response = self
            .authorize(request)
            .await
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_status(status.as_u16(), body))
    }
}

/// Map a reqwest failure that produced no HTTP status.
fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(timeout)
    } else {
        RemoteError::Network(err.to_string())
    }
}

#[async_trait]
impl PluginAdapter for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldSyncError> {
        let result = self
            .client
            .get(endpoint(&self.base_url, "health"))
            .timeout(self.mutation_timeout)
            .send()
            .await;
        Ok(match result {
            Ok(resp) if resp.status().is_success() => HealthStatus::Healthy,
            Ok(resp) => HealthStatus::Degraded(format!("health endpoint returned {}", resp.status())),
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), FieldSyncError> {
        Ok(())
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn send_mutation(&self, request: &MutationRequest) -> Result<(), RemoteError> {
        debug!(
            item_id = request.id,
            delivery_id = %request.delivery_id,
            attempt = request.attempt,
            "sending mutation"
        );
        let builder = self
            .client
            .post(endpoint(&self.base_url, "mutations"))
            .json(request);
        self.execute(builder, self.mutation_timeout).await
    }

    async fn upload_media(&self, upload: &MediaUpload) -> Result<(), RemoteError> {
        debug!(
            media_id = %upload.media_id,
            delivery_id = %upload.delivery_id,
            bytes = upload.bytes.len(),
            "uploading media"
        );
        let file = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload.mime_type)
            .map_err(|e| RemoteError::Network(format!("invalid mime type: {e}")))?;
        let form = Form::new()
            .part("file", file)
            .text("type", upload.media_type.to_string())
            .text("delivery_id", upload.delivery_id.clone())
            .text("media_id", upload.media_id.clone());

        let builder = self
            .client
            .post(endpoint(&self.base_url, "media"))
            .multipart(form);
        self.execute(builder, self.media_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::types::{MediaType, QueueItemType};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer, token: Option<&str>) -> HttpTransport {
        HttpTransport::new(&RemoteConfig {
            base_url: format!("{}/api", server.uri()),
            auth_token: token.map(String::from),
            mutation_timeout_secs: 2,
            media_timeout_secs: 2,
        })
        .unwrap()
    }

    fn mutation() -> MutationRequest {
        MutationRequest {
            id: 42,
            item_type: QueueItemType::DeliveryCompletion,
            delivery_id: "del_1".into(),
            payload: serde_json::json!({"media_count": 3}),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn mutation_posts_json_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mutations"))
            .and(header("authorization", "Bearer tok-123"))
            .and(body_partial_json(serde_json::json!({
                "id": 42,
                "type": "DELIVERY_COMPLETION",
                "delivery_id": "del_1",
                "attempt": 1
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        transport(&server, Some("tok-123"))
            .send_mutation(&mutation())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replaced_token_applies_to_every_clone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mutations"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/mutations"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = transport(&server, Some("stale"));
        let clone = transport.clone();
        assert_eq!(
            clone.send_mutation(&mutation()).await.unwrap_err(),
            RemoteError::Unauthorized
        );

        transport.set_auth_token(Some("fresh".into())).await;
        clone.send_mutation(&mutation()).await.unwrap();
        assert!(clone.has_auth_token().await);
    }

    async fn mutation_error(code: u16) -> RemoteError {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mutations"))
            .respond_with(ResponseTemplate::new(code).set_body_string("nope"))
            .mount(&server)
            .await;
        transport(&server, None)
            .send_mutation(&mutation())
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        assert_eq!(mutation_error(401).await, RemoteError::Unauthorized);
        assert_eq!(
            mutation_error(422).await,
            RemoteError::Rejected {
                status: 422,
                body: "nope".into()
            }
        );
        assert!(matches!(
            mutation_error(503).await,
            RemoteError::Server { status: 503, .. }
        ));
        assert!(matches!(
            mutation_error(429).await,
            RemoteError::Server { status: 429, .. }
        ));
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mutations"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let mut t = transport(&server, None);
        t.mutation_timeout = Duration::from_millis(200);
        let err = t.send_mutation(&mutation()).await.unwrap_err();
        assert_eq!(err, RemoteError::Timeout(Duration::from_millis(200)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let t = HttpTransport::new(&RemoteConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..RemoteConfig::default()
        })
        .unwrap();
        let err = t.send_mutation(&mutation()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn media_upload_is_multipart_with_declared_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/media"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let upload = MediaUpload {
            media_id: "med_1".into(),
            delivery_id: "del_1".into(),
            media_type: MediaType::Signature,
            file_name: "sig.png".into(),
            mime_type: MediaType::Signature.mime_type(),
            bytes: b"PNGDATA".to_vec(),
        };
        transport(&server, Some("t")).upload_media(&upload).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let req = &requests[0];
        let content_type = req.headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&req.body);
        assert!(body.contains("name=\"file\"; filename=\"sig.png\""));
        assert!(body.contains("image/png"));
        assert!(body.contains("PNGDATA"));
        assert!(body.contains("SIGNATURE"));
        assert!(body.contains("del_1"));
    }
}
