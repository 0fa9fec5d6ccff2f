//! Reactive asynchronous helper.
//!
//! # Design
//! `ReactiveHelper` mirrors the verb surface of the blocking helper but hands
//! back lazy descriptions instead of results:
//!
//! - [`Mono`] resolves to one decoded value,
//! - [`Flux`] yields a finite, ordered sequence of decoded values.
//!
//! Describing a call performs no I/O. Every resolution (`resolve`, `spawn`,
//! `stream`, `subscribe`, ...) issues its own request, so resolving the same
//! description twice hits the server twice. Work started in the background
//! runs on the ambient tokio runtime and is stopped through a
//! `CancellationToken`; stopping drops the in-flight request future, which
//! aborts the exchange.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::blocking::prepare;
use crate::codec;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{check_status, Headers, HttpMethod, HttpRequest};
use crate::transport::ReqwestTransport;

/// Elements buffered between a `Flux` producer and its consumer.
const FLUX_BUFFER: usize = 16;

/// Asynchronous `get/post/put/delete` returning [`Mono`] and [`Flux`].
#[derive(Debug, Clone)]
pub struct ReactiveHelper {
    config: ClientConfig,
    transport: ReqwestTransport,
}

impl ReactiveHelper {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self { config, transport })
    }

    pub fn get_mono<R>(&self, url: &str, headers: &Headers) -> Mono<R> {
        Mono::new(self.describe(HttpMethod::Get, url, headers, Ok(None)))
    }

    pub fn post_mono<B, R>(&self, url: &str, headers: &Headers, body: &B) -> Mono<R>
    where
        B: Serialize + ?Sized,
    {
        let body = codec::encode(body).map(Some);
        Mono::new(self.describe(HttpMethod::Post, url, headers, body))
    }

    pub fn put_mono<B, R>(&self, url: &str, headers: &Headers, body: &B) -> Mono<R>
    where
        B: Serialize + ?Sized,
    {
        let body = codec::encode(body).map(Some);
        Mono::new(self.describe(HttpMethod::Put, url, headers, body))
    }

    /// Resolves to `()` on any 2xx; a response body is discarded.
    pub fn delete_mono(&self, url: &str, headers: &Headers) -> Mono<()> {
        let mut call = self.describe(HttpMethod::Delete, url, headers, Ok(None));
        call.discard_body = true;
        Mono::new(call)
    }

    pub fn delete_mono_as<R>(&self, url: &str, headers: &Headers) -> Mono<R> {
        Mono::new(self.describe(HttpMethod::Delete, url, headers, Ok(None)))
    }

    pub fn get_flux<R>(&self, url: &str, headers: &Headers) -> Flux<R> {
        Flux::new(self.describe(HttpMethod::Get, url, headers, Ok(None)))
    }

    pub fn post_flux<B, R>(&self, url: &str, headers: &Headers, body: &B) -> Flux<R>
    where
        B: Serialize + ?Sized,
    {
        let body = codec::encode(body).map(Some);
        Flux::new(self.describe(HttpMethod::Post, url, headers, body))
    }

    /// Construction errors are kept and delivered on every resolution.
    fn describe(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &Headers,
        body: Result<Option<String>, ApiError>,
    ) -> Call {
        let request = body.and_then(|body| prepare(&self.config, method, url, headers, body));
        Call {
            transport: self.transport.clone(),
            request,
            discard_body: false,
        }
    }
}

/// One described exchange. Cloning it is cheap and each `fetch` is a fresh
/// request.
#[derive(Debug, Clone)]
struct Call {
    transport: ReqwestTransport,
    request: Result<HttpRequest, ApiError>,
    /// Success bodies are dropped and read as empty.
    discard_body: bool,
}

impl Call {
    async fn fetch(&self) -> Result<String, ApiError> {
        let req = self.request.clone()?;
        let method = req.method;
        let url = req.url.clone();
        let result = async {
            let response = self.transport.execute(req).await?;
            check_status(&response)?;
            if self.discard_body {
                return Ok(String::new());
            }
            Ok::<_, ApiError>(response.body)
        }
        .await;
        if let Err(err) = &result {
            warn!(%method, %url, error = %err, "reactive call failed");
        }
        result
    }

    async fn fetch_elements(&self) -> Result<Vec<Value>, ApiError> {
        let body = self.fetch().await?;
        codec::decode_sequence(&body)
    }
}

/// A lazily described call resolving to a single `R`.
pub struct Mono<R> {
    call: Call,
    _shape: PhantomData<fn() -> R>,
}

impl<R> Clone for Mono<R> {
    fn clone(&self) -> Self {
        Self {
            call: self.call.clone(),
            _shape: PhantomData,
        }
    }
}

impl<R> Mono<R> {
    fn new(call: Call) -> Self {
        Self {
            call,
            _shape: PhantomData,
        }
    }
}

impl<R: DeserializeOwned> Mono<R> {
    /// Issue the request and wait for the decoded value.
    pub async fn resolve(&self) -> Result<R, ApiError> {
        let body = self.call.fetch().await?;
        codec::decode(&body)
    }
}

impl<R: DeserializeOwned + Send + 'static> Mono<R> {
    /// Start resolving on the runtime and return immediately.
    pub fn spawn(&self) -> Deferred<R> {
        let token = CancellationToken::new();
        let guard = token.clone();
        let mono = self.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => Err(ApiError::Cancelled),
                result = mono.resolve() => result,
            }
        });
        Deferred { handle, token }
    }

    /// Resolve in the background and hand the outcome to exactly one of the
    /// callbacks. Nothing is delivered once the subscription is cancelled.
    pub fn subscribe<S, E>(&self, on_success: S, on_error: E) -> Subscription
    where
        S: FnOnce(R) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        let token = CancellationToken::new();
        let guard = token.clone();
        let mono = self.clone();
        let handle = tokio::spawn(async move {
            let result = tokio::select! {
                _ = guard.cancelled() => return,
                result = mono.resolve() => result,
            };
            if guard.is_cancelled() {
                return;
            }
            match result {
                Ok(value) => on_success(value),
                Err(err) => on_error(err),
            }
        });
        Subscription { token, handle }
    }
}

/// A lazily described call resolving to an ordered sequence of `R`.
pub struct Flux<R> {
    call: Call,
    _shape: PhantomData<fn() -> R>,
}

impl<R> Clone for Flux<R> {
    fn clone(&self) -> Self {
        Self {
            call: self.call.clone(),
            _shape: PhantomData,
        }
    }
}

impl<R> Flux<R> {
    fn new(call: Call) -> Self {
        Self {
            call,
            _shape: PhantomData,
        }
    }
}

impl<R: DeserializeOwned + Send + 'static> Flux<R> {
    /// Issue the request and stream decoded elements in server order.
    ///
    /// Elements are decoded one at a time; a malformed element ends the
    /// stream with a decode error after the elements before it.
    pub fn stream(&self) -> FluxStream<R> {
        let (tx, rx) = mpsc::channel(FLUX_BUFFER);
        let token = CancellationToken::new();
        let guard = token.clone();
        let call = self.call.clone();

        tokio::spawn(async move {
            let fetched = tokio::select! {
                _ = guard.cancelled() => return,
                fetched = call.fetch_elements() => fetched,
            };
            let values = match fetched {
                Ok(values) => values,
                Err(err) => {
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            };
            debug!(elements = values.len(), "flux body received");
            for value in values {
                let item = codec::decode_value::<R>(value);
                let failed = item.is_err();
                tokio::select! {
                    _ = guard.cancelled() => return,
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
                if failed {
                    return;
                }
            }
        });

        FluxStream {
            rx,
            token,
            terminated: false,
        }
    }

    /// Resolve and gather every element, failing on the first error.
    pub async fn collect_list(&self) -> Result<Vec<R>, ApiError> {
        let mut stream = self.stream();
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Resolve in the background: `on_next` per element in order, then
    /// `on_complete` once; or `on_error` once and nothing after it.
    pub fn subscribe<N, E, C>(&self, mut on_next: N, on_error: E, on_complete: C) -> Subscription
    where
        N: FnMut(R) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let mut stream = self.stream();
        let token = stream.token.clone();
        let handle = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => on_next(value),
                    Err(err) => {
                        on_error(err);
                        return;
                    }
                }
            }
            if !stream.is_cancelled() {
                on_complete();
            }
        });
        Subscription { token, handle }
    }
}

/// Handle to a `Mono` resolving in the background. Await it for the result;
/// dropping it cancels the resolution.
pub struct Deferred<R> {
    handle: JoinHandle<Result<R, ApiError>>,
    token: CancellationToken,
}

impl<R> Deferred<R> {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<R> Future for Deferred<R> {
    type Output = Result<R, ApiError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ApiError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for Deferred<R> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Background delivery started by `subscribe`. Dropping it leaves delivery
/// running; call [`Subscription::cancel`] to stop it.
pub struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until every callback that will fire has fired.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }
    }
}

/// Elements of one `Flux` resolution.
///
/// Ends with `None` on completion. An `Err` item is always the last item.
/// Cancelling or dropping the stream aborts the request and stops delivery.
pub struct FluxStream<R> {
    rx: mpsc::Receiver<Result<R, ApiError>>,
    token: CancellationToken,
    terminated: bool,
}

impl<R> FluxStream<R> {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<R> Stream for FluxStream<R> {
    type Item = Result<R, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated || self.token.is_cancelled() {
            self.terminated = true;
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Err(err))) => {
                self.terminated = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for FluxStream<R> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
