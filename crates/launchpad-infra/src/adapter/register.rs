//! `register-release` action: record the release with a Sentry-compatible
//! error tracking service.
//!
//! Creates the release (`POST /api/0/organizations/{org}/releases/`) and,
//! when `environment` is given, records a deploy for it. An existing release
//! is accepted, so the step can be retried safely.

use std::time::Duration;

use launchpad_core::pipeline::adapter::{AdapterOutput, StepAdapter, StepInvocation};
use launchpad_types::error::AdapterError;
use serde::Serialize;

pub const DEFAULT_URL: &str = "https://sentry.io";

/// Maximum response body length kept in error details.
const MAX_BODY_DETAIL: usize = 512;

#[derive(Debug, Clone)]
pub struct RegisterReleaseAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct NewRelease<'a> {
    version: &'a str,
    projects: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct NewDeploy<'a> {
    environment: &'a str,
}

impl RegisterReleaseAdapter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("launchpad/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post<T: Serialize>(
        &self,
        invocation: &StepInvocation<'_>,
        url: &str,
        token: &str,
        body: &T,
    ) -> Result<reqwest::StatusCode, AdapterError> {
        let masker = invocation.masker();
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| AdapterError::Registration {
                detail: masker.mask(&format!("request to {url} failed: {e}")),
                status: None,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(status);
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_BODY_DETAIL).collect();
        Err(AdapterError::Registration {
            detail: masker.mask(&format!("{url} returned {status}: {}", body.trim())),
            status: Some(status.as_u16()),
        })
    }
}

impl Default for RegisterReleaseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StepAdapter for RegisterReleaseAdapter {
    fn action(&self) -> &str {
        "register-release"
    }

    async fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Result<AdapterOutput, AdapterError> {
        let params = invocation.params;
        let org = params.require("org")?;
        let project = params.require("project")?;
        let token = params.require("token")?;
        let version = match params.get("version").filter(|v| !v.is_empty()) {
            Some(version) => version,
            None => invocation.trigger.release_id().ok_or_else(|| {
                AdapterError::invalid_parameter(
                    "version",
                    "required when the trigger carries no release id",
                )
            })?,
        };
        let base = params.get_or("url", DEFAULT_URL).trim_end_matches('/');

        let releases_url = format!("{base}/api/0/organizations/{org}/releases/");
        let status = self
            .post(
                invocation,
                &releases_url,
                token,
                &NewRelease {
                    version,
                    projects: [project],
                },
            )
            .await?;
        tracing::info!(version, project, status = status.as_u16(), "release registered");

        let mut summary = format!("registered {project}@{version}");
        if let Some(environment) = params.get("environment").filter(|e| !e.is_empty()) {
            let deploys_url = format!("{releases_url}{version}/deploys/");
            self.post(invocation, &deploys_url, token, &NewDeploy { environment })
                .await?;
            summary.push_str(&format!(" in {environment}"));
        }

        Ok(AdapterOutput::default().with_summary(invocation.masker().mask(&summary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::Harness;
    use launchpad_types::workflow::StepSpec;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn step(url: &str) -> StepSpec {
        StepSpec::new("register", "register-release")
            .param("org", "acme")
            .param("project", "web-ui")
            .param("url", url)
            .secret_param("token", "SENTRY_TOKEN")
    }

    #[tokio::test]
    async fn creates_release_with_trigger_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/0/organizations/acme/releases/"))
            .and(header("authorization", "Bearer sntrys_123"))
            .and(body_json(json!({ "version": "v1.2.3", "projects": ["web-ui"] })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "version": "v1.2.3" })))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(step(&server.uri()), &[("SENTRY_TOKEN", "sntrys_123")], tmp.path()).await;

        let out = RegisterReleaseAdapter::new()
            .execute(&harness.invocation())
            .await
            .unwrap();
        assert_eq!(out.summary.as_deref(), Some("registered web-ui@v1.2.3"));
    }

    #[tokio::test]
    async fn records_deploy_when_environment_given() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/0/organizations/acme/releases/"))
            .respond_with(ResponseTemplate::new(208))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/0/organizations/acme/releases/2.0.0/deploys/"))
            .and(body_json(json!({ "environment": "production" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let step = step(&server.uri())
            .param("version", "2.0.0")
            .param("environment", "production");
        let harness = Harness::new(step, &[("SENTRY_TOKEN", "sntrys_123")], tmp.path()).await;

        let out = RegisterReleaseAdapter::new()
            .execute(&harness.invocation())
            .await
            .unwrap();
        assert_eq!(
            out.summary.as_deref(),
            Some("registered web-ui@2.0.0 in production")
        );
    }

    #[tokio::test]
    async fn http_error_is_masked_registration_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token sntrys_123"))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(step(&server.uri()), &[("SENTRY_TOKEN", "sntrys_123")], tmp.path()).await;

        let err = RegisterReleaseAdapter::new()
            .execute(&harness.invocation())
            .await
            .unwrap_err();
        match err {
            AdapterError::Registration { detail, status } => {
                assert_eq!(status, Some(401));
                assert!(detail.contains("invalid token ***"));
                assert!(!detail.contains("sntrys_123"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_any_request() {
        let tmp = tempfile::tempdir().unwrap();
        let step = StepSpec::new("register", "register-release")
            .param("org", "acme")
            .param("project", "web-ui");
        let harness = Harness::new(step, &[], tmp.path()).await;

        let err = RegisterReleaseAdapter::new()
            .execute(&harness.invocation())
            .await
            .unwrap_err();
        assert_eq!(err, AdapterError::missing_parameter("token"));
    }
}
