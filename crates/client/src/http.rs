//! Shared HTTP plumbing for every Nutanix API surface.
//!
//! All clients talk JSON over HTTPS with basic auth. Each API family mounts
//! its paths under an absolute path (`api/nutanix/v3`, `karbon`, `era/v0.9`,
//! `api`) on top of a `scheme://host/` base URL.
//!
//! With session auth the client keeps the cookies Prism hands out and stops
//! sending basic auth once it holds one. A 401 on a cookie-only request
//! means the session expired; the request is replayed once with basic auth.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

const MEDIA_TYPE: &str = "application/json";
const MAX_REDIRECTS: usize = 10;

/// Connection settings for one Nutanix endpoint.
#[derive(Debug)]
pub struct Credentials {
    pub endpoint: String,
    pub port: String,
    pub username: String,
    pub password: SecretString,
    pub insecure: bool,
    pub session_auth: bool,
    pub proxy_url: Option<String>,
}

impl Credentials {
    pub fn new(
        endpoint: impl Into<String>,
        port: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            port: port.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            insecure: false,
            session_auth: false,
            proxy_url: None,
        }
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn proxy_url(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url;
        self
    }

    pub fn session_auth(mut self, session_auth: bool) -> Self {
        self.session_auth = session_auth;
        self
    }

    /// `scheme://host[:port]/`
    pub fn base_url(&self) -> Result<Url> {
        let (scheme, host) = match self.endpoint.strip_prefix("http://") {
            Some(rest) => ("http", rest),
            None => (
                "https",
                self.endpoint
                    .strip_prefix("https://")
                    .unwrap_or(&self.endpoint),
            ),
        };
        let host = host.trim_end_matches('/');
        if host.is_empty() {
            return Err(Error::InvalidConfig("endpoint must not be empty".to_string()));
        }

        let authority = if self.port.is_empty() || host.contains(':') {
            host.to_string()
        } else {
            format!("{}:{}", host, self.port)
        };

        Url::parse(&format!("{}://{}/", scheme, authority))
            .map_err(|e| Error::InvalidConfig(format!("invalid endpoint {}: {}", self.endpoint, e)))
    }
}

/// One `message_list` entry of a v3 error body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error body returned by the v3 intent API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message_list: Vec<MessageResource>,
    #[serde(default)]
    pub state: Option<String>,
}

impl ErrorResponse {
    pub fn message(&self) -> String {
        self.message_list
            .iter()
            .map(|m| match &m.reason {
                Some(reason) if !reason.is_empty() => format!("{}: {}", reason, m.message),
                _ => m.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Builds an error out of a non-2xx body.
pub fn error_from_body(status: u16, body: &str) -> Error {
    let parsed = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .filter(|e| !e.message_list.is_empty())
        .map(|e| e.message())
        .or_else(|| v4_error_message(body));

    let message = match parsed {
        Some(message) => message,
        None if body.trim().is_empty() => format!("request failed with status {}", status),
        None => body.trim().to_string(),
    };

    Error::Api { status, message }
}

fn v4_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let errors = value.pointer("/data/error")?.as_array()?;
    let messages: Vec<String> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    (!messages.is_empty()).then(|| messages.join("; "))
}

/// Passes 2xx responses through and turns everything else into an error.
pub async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status.as_u16(), &body))
}

/// JSON-over-HTTP client bound to one base URL and absolute path.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    absolute_path: String,
    user_agent: String,
    username: String,
    password: SecretString,
    /// Cookie jar shared with `client` when session auth is on.
    session: Option<Arc<Jar>>,
}

impl HttpClient {
    pub fn new(credentials: &Credentials, absolute_path: &str, user_agent: &str) -> Result<Self> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(credentials.insecure)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

        if let Some(proxy) = credentials.proxy_url.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let session = credentials.session_auth.then(|| Arc::new(Jar::default()));
        if let Some(jar) = &session {
            builder = builder.cookie_provider(jar.clone());
        }

        Ok(Self {
            client: builder.build()?,
            base_url: credentials.base_url()?,
            absolute_path: absolute_path.trim_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            username: credentials.username.clone(),
            password: SecretString::from(credentials.password.expose_secret().to_string()),
            session,
        })
    }

    /// Whether the jar holds a session cookie for `url`.
    fn has_session(&self, url: &Url) -> bool {
        self.session
            .as_ref()
            .is_some_and(|jar| jar.cookies(url).is_some())
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
        basic_auth: bool,
    ) -> Result<Response> {
        let mut request = self.client.request(method, url).headers(headers);
        if basic_auth {
            request = request.basic_auth(&self.username, Some(self.password.expose_secret()));
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        Ok(request.send().await?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Resolves `path` below the absolute path.
    pub fn url(&self, path: &str) -> Result<Url> {
        let joined = if self.absolute_path.is_empty() {
            path.trim_start_matches('/').to_string()
        } else {
            format!("{}/{}", self.absolute_path, path.trim_start_matches('/'))
        };
        self.base_url
            .join(&joined)
            .map_err(|e| Error::InvalidConfig(format!("invalid request path {}: {}", path, e)))
    }

    /// Sends a request and returns the raw, already status-checked response.
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: &[(&str, String)],
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        debug!("{} {}", method, url);

        let mut header_map = HeaderMap::new();
        header_map.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static(MEDIA_TYPE));
        if let Ok(agent) = HeaderValue::from_str(&self.user_agent) {
            header_map.insert(USER_AGENT, agent);
        }
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Internal(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Internal(format!("invalid header value: {}", e)))?;
            header_map.insert(name, value);
        }

        let payload = body.map(serde_json::to_vec).transpose()?;
        let resumed = self.has_session(&url);
        let response = self
            .dispatch(method.clone(), url.clone(), header_map.clone(), payload.clone(), !resumed)
            .await?;
        let response = if resumed && response.status() == StatusCode::UNAUTHORIZED {
            debug!("session for {} expired, signing in again", url);
            self.dispatch(method, url, header_map, payload, true).await?
        } else {
            response
        };

        check_response(response).await
    }

    /// Sends a request and decodes the JSON reply. An empty reply decodes as `null`.
    pub async fn request<B, D>(&self, method: Method, path: &str, body: Option<&B>) -> Result<D>
    where
        B: Serialize + ?Sized,
        D: DeserializeOwned,
    {
        let response = self.send(method, path, body, &[]).await?;
        decode_body(response).await
    }

    /// GET without a body.
    pub async fn get<D: DeserializeOwned>(&self, path: &str) -> Result<D> {
        self.request::<(), D>(Method::GET, path, None).await
    }
}

/// Decodes a JSON body, treating an empty body as `null`.
pub async fn decode_body<D: DeserializeOwned>(response: Response) -> Result<D> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Client-side filter on list results: keep entities whose `name` (a dotted
/// path below one of the search paths) renders to one of `values`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdditionalFilter {
    pub name: String,
    pub values: Vec<String>,
}

/// Applies `filters` to the `entities` array of a list response.
pub fn filter_entities(
    mut body: Value,
    filters: &[AdditionalFilter],
    base_search_paths: &[&str],
) -> Value {
    if filters.is_empty() {
        return body;
    }
    if let Some(entities) = body.get_mut("entities").and_then(Value::as_array_mut) {
        entities.retain(|entity| {
            filters
                .iter()
                .all(|filter| entity_matches(entity, filter, base_search_paths))
        });
    }
    body
}

fn entity_matches(entity: &Value, filter: &AdditionalFilter, base_search_paths: &[&str]) -> bool {
    base_search_paths.iter().any(|base| {
        let full = format!("{}.{}", base, filter.name);
        let found = full
            .split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(entity, |current, segment| current.get(segment));
        match found {
            Some(value) => {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                filter.values.iter().any(|v| *v == rendered)
            }
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ERROR_BODY: &str = r#"{"api_version": "3.1", "code": 400, "kind": "error", "message_list":
        [{"message": "This field may not be blank."}], "state": "ERROR"}"#;

    fn credentials(endpoint: &str) -> Credentials {
        Credentials::new(endpoint, "", "admin", "secret")
    }

    #[test]
    fn base_url_defaults_to_https_with_port() {
        let creds = Credentials::new("foo.com", "9440", "u", "p");
        assert_eq!(creds.base_url().unwrap().as_str(), "https://foo.com:9440/");
    }

    #[test]
    fn base_url_keeps_explicit_http_scheme() {
        let creds = Credentials::new("http://127.0.0.1:8000", "", "u", "p");
        assert_eq!(creds.base_url().unwrap().as_str(), "http://127.0.0.1:8000/");
    }

    #[test]
    fn empty_endpoint_is_rejected() {
        let creds = Credentials::new("", "9440", "u", "p");
        assert!(matches!(creds.base_url(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn url_is_joined_below_absolute_path() {
        let credentials = Credentials::new("foo.com", "9440", "u", "p");
        let client = HttpClient::new(&credentials, "api/nutanix/v3", "nutanix/v3").unwrap();
        assert_eq!(
            client.url("/foo").unwrap().as_str(),
            "https://foo.com:9440/api/nutanix/v3/foo"
        );
        assert_eq!(client.user_agent(), "nutanix/v3");
    }

    #[test]
    fn error_response_message_is_not_empty() {
        let err = ErrorResponse {
            message_list: vec![MessageResource {
                message: "This field may not be blank.".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(!err.message().is_empty());
    }

    #[test]
    fn error_body_surfaces_message_list() {
        let err = error_from_body(400, ERROR_BODY);
        assert!(err.to_string().contains("This field may not be blank."));
    }

    #[test]
    fn error_body_surfaces_v4_errors() {
        let body = r#"{"data":{"error":[{"message":"Volume group name is invalid"}]}}"#;
        let err = error_from_body(400, body);
        assert!(err.to_string().contains("Volume group name is invalid"));
    }

    #[test]
    fn error_body_falls_back_to_raw_text() {
        let err = error_from_body(400, "Bad Request\n");
        assert!(err.to_string().contains("Bad Request"));
    }

    #[tokio::test]
    async fn request_sends_auth_and_decodes_json() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/foo"))
            .and(basic_auth("admin", "secret"))
            .and(header("accept", "application/json"))
            .and(header("user-agent", "nutanix/v3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"A": "a"})))
            .mount(&server)
            .await;
        let client =
            HttpClient::new(&credentials(&server.uri()), "api/nutanix/v3", "nutanix/v3").unwrap();

        // Act
        let body: Value = client.get("/foo").await.unwrap();

        // Assert
        assert_eq!(body, json!({"A": "a"}));
    }

    fn without_authorization(request: &wiremock::Request) -> bool {
        !request.headers.contains_key("authorization")
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/users/me"))
            .and(basic_auth("admin", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "NTNX_IGW_SESSION=abc; Path=/; HttpOnly")
                    .set_body_json(json!({})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn session_cookie_replaces_basic_auth() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/foo"))
            .and(header("cookie", "NTNX_IGW_SESSION=abc"))
            .and(without_authorization)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"A": "a"})))
            .expect(1)
            .mount(&server)
            .await;
        let creds = credentials(&server.uri()).session_auth(true);
        let client = HttpClient::new(&creds, "api/nutanix/v3", "nutanix/v3").unwrap();

        // Act
        let _: Value = client.get("/users/me").await.unwrap();
        let body: Value = client.get("/foo").await.unwrap();

        // Assert
        assert_eq!(body, json!({"A": "a"}));
    }

    #[tokio::test]
    async fn expired_session_signs_in_again() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/foo"))
            .and(without_authorization)
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/foo"))
            .and(basic_auth("admin", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"A": "a"})))
            .expect(1)
            .mount(&server)
            .await;
        let creds = credentials(&server.uri()).session_auth(true);
        let client = HttpClient::new(&creds, "api/nutanix/v3", "nutanix/v3").unwrap();

        // Act
        let _: Value = client.get("/users/me").await.unwrap();
        let body: Value = client.get("/foo").await.unwrap();

        // Assert
        assert_eq!(body, json!({"A": "a"}));
    }

    #[tokio::test]
    async fn without_session_auth_every_request_uses_basic_auth() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/foo"))
            .and(basic_auth("admin", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"A": "a"})))
            .expect(1)
            .mount(&server)
            .await;
        let client =
            HttpClient::new(&credentials(&server.uri()), "api/nutanix/v3", "nutanix/v3").unwrap();

        // Act
        let _: Value = client.get("/users/me").await.unwrap();
        let body: Value = client.get("/foo").await.unwrap();

        // Assert
        assert_eq!(body, json!({"A": "a"}));
    }

    #[tokio::test]
    async fn request_turns_http_error_into_api_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/"))
            .respond_with(ResponseTemplate::new(400).set_body_string(ERROR_BODY))
            .mount(&server)
            .await;
        let client =
            HttpClient::new(&credentials(&server.uri()), "api/nutanix/v3", "nutanix/v3").unwrap();

        // Act
        let result: Result<Value> = client.get("/").await;

        // Assert
        match result {
            Err(Error::Api { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("This field may not be blank."));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn redirect_loop_is_an_error() {
        // Arrange
        let server = MockServer::start().await;
        let target = format!("{}/api/nutanix/v3/", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", target.as_str()))
            .mount(&server)
            .await;
        let client =
            HttpClient::new(&credentials(&server.uri()), "api/nutanix/v3", "nutanix/v3").unwrap();

        // Act
        let result: Result<Value> = client.get("/").await;

        // Assert
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn empty_body_decodes_as_unit() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/nutanix/v3/categories/env"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let client =
            HttpClient::new(&credentials(&server.uri()), "api/nutanix/v3", "nutanix/v3").unwrap();

        let result: Result<()> = client
            .request::<(), ()>(Method::DELETE, "/categories/env", None)
            .await;

        assert!(result.is_ok());
    }

    fn entity(name: &str, vlan_id: &str, uuid: &str) -> Value {
        let vlan_id: i64 = vlan_id.parse().unwrap();
        json!({
            "spec": {
                "cluster_reference": {"uuid": uuid},
                "name": name,
                "resources": {"vlan_id": vlan_id}
            }
        })
    }

    fn filter(name: &str, values: &[&str]) -> Vec<AdditionalFilter> {
        vec![AdditionalFilter {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }]
    }

    #[test]
    fn filter_entities_matches_spec_and_resources_paths() {
        let e1 = entity("subnet-01", "111", "012345-111");
        let e2 = entity("subnet-01", "112", "012345-112");
        let e3 = entity("subnet-02", "112", "012345-111");
        let input = json!({"entities": [e1.clone(), e2.clone(), e3]});
        let search = ["spec", "spec.resources"];

        let by_name =
            filter_entities(input.clone(), &filter("name", &["subnet-01", "subnet-03"]), &search);
        assert_eq!(by_name, json!({"entities": [e1.clone(), e2.clone()]}));

        let by_vlan =
            filter_entities(input.clone(), &filter("vlan_id", &["111", "subnet-03"]), &search);
        assert_eq!(by_vlan, json!({"entities": [e1]}));

        let by_cluster = filter_entities(
            input,
            &filter("cluster_reference.uuid", &["111", "012345-112"]),
            &search,
        );
        assert_eq!(by_cluster, json!({"entities": [e2]}));
    }
}
