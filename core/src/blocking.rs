//! Imperative synchronous helper.
//!
//! Every call resolves the URL, merges headers, encodes the body, executes the
//! exchange on the calling thread and decodes the body into the requested
//! shape: `T`, `Vec<T>` for lists, or `()` when no content is expected.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::codec;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{check_status, Headers, HttpMethod, HttpRequest};
use crate::transport::{Transport, UreqTransport};

/// Blocking `get/post/put/delete` over any [`Transport`].
#[derive(Clone)]
pub struct BlockingHelper<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl BlockingHelper<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self { config, transport }
    }
}

impl Default for BlockingHelper<UreqTransport> {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl<T: Transport> BlockingHelper<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn get<R: DeserializeOwned>(&self, url: &str, headers: &Headers) -> Result<R, ApiError> {
        self.exchange(HttpMethod::Get, url, headers, None)
    }

    pub fn post<B, R>(&self, url: &str, headers: &Headers, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = codec::encode(body)?;
        self.exchange(HttpMethod::Post, url, headers, Some(body))
    }

    pub fn put<B, R>(&self, url: &str, headers: &Headers, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = codec::encode(body)?;
        self.exchange(HttpMethod::Put, url, headers, Some(body))
    }

    /// Delete and discard whatever body a successful response carries.
    pub fn delete(&self, url: &str, headers: &Headers) -> Result<(), ApiError> {
        self.exchange_no_content(HttpMethod::Delete, url, headers, None)
    }

    /// Delete and decode the response body as `R`.
    pub fn delete_as<R: DeserializeOwned>(
        &self,
        url: &str,
        headers: &Headers,
    ) -> Result<R, ApiError> {
        self.exchange(HttpMethod::Delete, url, headers, None)
    }

    /// Execute one exchange. `body` must already be encoded JSON.
    pub fn exchange<R: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &Headers,
        body: Option<String>,
    ) -> Result<R, ApiError> {
        self.run(method, url, headers, body, codec::decode::<R>)
    }

    /// Execute one exchange where only the status matters.
    pub fn exchange_no_content(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &Headers,
        body: Option<String>,
    ) -> Result<(), ApiError> {
        self.run(method, url, headers, body, |_| Ok(()))
    }

    fn run<R>(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &Headers,
        body: Option<String>,
        read: impl FnOnce(&str) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let req = prepare(&self.config, method, url, headers, body)?;
        let url = req.url.clone();
        let result = self.transport.execute(req).and_then(|response| {
            check_status(&response)?;
            read(&response.body)
        });
        if let Err(err) = &result {
            warn!(%method, %url, error = %err, "blocking call failed");
        }
        result
    }
}

/// Build the request shared by both helpers; fails before any I/O.
pub(crate) fn prepare(
    config: &ClientConfig,
    method: HttpMethod,
    url: &str,
    headers: &Headers,
    body: Option<String>,
) -> Result<HttpRequest, ApiError> {
    let url = config.resolve_url(url)?;
    let headers = headers.merged_over(&config.default_headers);
    headers.validate()?;
    let req = HttpRequest::new(method, url).with_headers(headers);
    Ok(match body {
        Some(body) => req.with_json_body(body),
        None => req,
    })
}
