//! HTTP transport for the Cloud Backup REST API

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::auth::Authenticator;
use crate::config::Settings;
use crate::{RcbuError, RcbuResult};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Scheme and host every request path is joined onto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    ssl_enabled: bool,
    host: String,
}

impl Endpoint {
    pub fn new(ssl_enabled: bool, host: impl Into<String>) -> Self {
        Self {
            ssl_enabled,
            host: host.into(),
        }
    }

    pub fn ssl_enabled(&self) -> bool {
        self.ssl_enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> &'static str {
        scheme_for(self.ssl_enabled)
    }

    pub fn uri(&self, path: &str) -> String {
        self.uri_on(&self.host, path)
    }

    /// Same scheme, different host
    pub fn uri_on(&self, host: &str, path: &str) -> String {
        format!("{}://{}{}", self.scheme(), host, path)
    }

    /// Full URI for a request, honouring its host and scheme overrides
    pub fn request_uri(&self, request: &ApiRequest) -> String {
        let host = request.host.as_deref().unwrap_or(&self.host);
        let ssl = request.ssl.unwrap_or(self.ssl_enabled);
        format!("{}://{}{}", scheme_for(ssl), host, request.path)
    }
}

fn scheme_for(ssl: bool) -> &'static str {
    if ssl {
        "https"
    } else {
        "http"
    }
}

/// Request builder for API calls
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(&'static str, String)>,
    /// Overrides the endpoint host (RSE lives on its own host)
    pub host: Option<String>,
    /// Overrides the endpoint SSL flag
    pub ssl: Option<bool>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            host: None,
            ssl: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> RcbuResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }
}

/// Authenticated API client; cheap to clone
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    auth: Arc<dyn Authenticator>,
}

impl ApiClient {
    pub fn new(endpoint: Endpoint, auth: Arc<dyn Authenticator>) -> RcbuResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("rcbu/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http_client(http, endpoint, auth))
    }

    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: Endpoint,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            http,
            endpoint,
            auth,
        }
    }

    /// Build a client and its authenticator from loaded settings
    pub fn from_settings(settings: &Settings) -> RcbuResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.api.request_timeout))
            .user_agent(concat!("rcbu/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let auth = super::auth::from_settings(&settings.auth, http.clone())?;
        let endpoint = Endpoint::new(settings.api.ssl_enabled, settings.api.host.clone());
        Ok(Self::with_http_client(http, endpoint, auth))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        Arc::clone(&self.auth)
    }

    /// Send a request with the auth token and JSON content type attached.
    ///
    /// The response is returned whatever its status; callers decide which
    /// codes mean success for their endpoint.
    pub async fn send(&self, request: ApiRequest) -> RcbuResult<Response> {
        let token = self.auth.auth_token().await?;
        let uri = self.endpoint.request_uri(&request);

        debug!("{} {}", request.method, uri);

        let mut builder = self
            .http
            .request(request.method, &uri)
            .header(AUTH_TOKEN_HEADER, token)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            let body = serde_json::to_string(body)?;
            trace!("Request body: {}", body);
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        debug!("{} -> {}", uri, response.status());
        Ok(response)
    }

    /// Send and require `expected`; any other status becomes [`RcbuError::Api`]
    pub async fn send_expecting(
        &self,
        request: ApiRequest,
        expected: StatusCode,
    ) -> RcbuResult<Response> {
        let response = self.send(request).await?;
        if response.status() == expected {
            Ok(response)
        } else {
            Err(api_error(response).await)
        }
    }
}

/// Convert a failed response into an error, keeping the body for diagnostics
pub async fn api_error(response: Response) -> RcbuError {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    let body = response.text().await.unwrap_or_default();
    RcbuError::api(status.as_u16(), reason, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::auth::MockAuthenticator;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn host_of(server: &MockServer) -> String {
        server.uri().trim_start_matches("http://").to_string()
    }

    #[test]
    fn test_endpoint_uri() {
        let secure = Endpoint::new(true, "dfw.backup.api.rackspacecloud.com");
        assert_eq!(
            secure.uri("/v1.0/user/agents"),
            "https://dfw.backup.api.rackspacecloud.com/v1.0/user/agents"
        );

        let plain = Endpoint::new(false, "localhost:8080");
        assert_eq!(plain.uri_on("rse.local", "/channel"), "http://rse.local/channel");
    }

    #[test]
    fn test_request_overrides_host_and_scheme() {
        let plain = Endpoint::new(false, "localhost:8080");
        assert_eq!(
            plain.request_uri(&ApiRequest::get("/v1.0/user/agents")),
            "http://localhost:8080/v1.0/user/agents"
        );

        let request = ApiRequest::get("/channel").with_host("rse.local").with_ssl(true);
        assert_eq!(plain.request_uri(&request), "https://rse.local/channel");
    }

    #[tokio::test]
    async fn test_send_attaches_token_from_authenticator() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1.0/agent/logging"))
            .and(header("X-Auth-Token", "mock-token"))
            .and(header("Content-Type", JSON_CONTENT_TYPE))
            .and(body_json(serde_json::json!({"MachineAgentId": 1})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut auth = MockAuthenticator::new();
        auth.expect_auth_token()
            .times(1)
            .returning(|| Ok("mock-token".to_string()));

        let client = ApiClient::new(Endpoint::new(false, host_of(&server)), Arc::new(auth)).unwrap();
        let request = ApiRequest::put("/v1.0/agent/logging")
            .with_json(&serde_json::json!({"MachineAgentId": 1}))
            .unwrap();

        let response = client.send_expecting(request, StatusCode::NO_CONTENT).await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn test_unexpected_status_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/agent/9"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such agent"))
            .mount(&server)
            .await;

        let mut auth = MockAuthenticator::new();
        auth.expect_auth_token().returning(|| Ok("t".to_string()));

        let client = ApiClient::new(Endpoint::new(false, host_of(&server)), Arc::new(auth)).unwrap();
        let err = client
            .send_expecting(ApiRequest::get("/v1.0/agent/9"), StatusCode::OK)
            .await
            .unwrap_err();

        match err {
            RcbuError::Api { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such agent");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auth_failure_stops_request() {
        let mut auth = MockAuthenticator::new();
        auth.expect_auth_token()
            .returning(|| Err(RcbuError::authentication("bad key")));

        // Nothing listens here; the request must never be attempted
        let client = ApiClient::new(Endpoint::new(false, "127.0.0.1:9"), Arc::new(auth)).unwrap();
        let err = client.send(ApiRequest::get("/v1.0/user/agents")).await.unwrap_err();
        assert!(matches!(err, RcbuError::Authentication { .. }));
    }
}
