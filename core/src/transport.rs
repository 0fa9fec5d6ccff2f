//! Transports: the only code that performs network I/O.
//!
//! `UreqTransport` executes an `HttpRequest` on the calling thread.
//! `ReqwestTransport` does the same on the tokio runtime. Both hand every
//! status code back as data; interpreting it is left to the caller.

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};

/// Blocking HTTP capability used by the declarative client and the
/// blocking helper.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// ureq's status-code-as-error behavior is disabled so 4xx/5xx responses
/// reach the caller with their body intact.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        let result = match request.body {
            Some(body) => self.agent.run(builder.body(body).map_err(invalid_request)?),
            None => self.agent.run(builder.body(()).map_err(invalid_request)?),
        };
        let mut response = result.map_err(ureq_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
            .collect::<Headers>();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        debug!(status, url = %request.url, "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn invalid_request(err: ureq::http::Error) -> ApiError {
    ApiError::Construction(err.to_string())
}

fn ureq_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::BadUri(uri) => ApiError::Construction(format!("invalid url {uri}")),
        ureq::Error::Http(e) => ApiError::Construction(e.to_string()),
        other => ApiError::Connection(other.to_string()),
    }
}

/// Non-blocking transport backed by a pooled `reqwest::Client`.
///
/// Dropping the future returned by [`ReqwestTransport::execute`] aborts the
/// exchange.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Construction(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
            .collect::<Headers>();
        let body = response.text().await.map_err(reqwest_error)?;

        debug!(status, url = %request.url, "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::Construction(err.to_string())
    } else {
        ApiError::Connection(err.to_string())
    }
}
