//! Typed HTTP client helpers in three styles.
//!
//! # Overview
//! - [`SampleClient`]: declarative. Endpoints are declared as
//!   [`Exchange`] constants (method + path template) and adapted into typed
//!   calls with an explicit `build_*` / `parse_*` split.
//! - [`BlockingHelper`]: imperative `get/post/put/delete` that blocks the
//!   calling thread and decodes into any shape (`T`, `Vec<T>`, `()`).
//! - [`ReactiveHelper`]: the same verbs returning lazy [`Mono`] / [`Flux`]
//!   descriptions resolved on the tokio runtime, with cancellation.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   only the transports touch the network.
//! - One stateless JSON codec is shared by every style.
//! - Every failure is an [`ApiError`] that separates "the server said no"
//!   from "no answer" from "unreadable answer" from "bad request".

pub mod blocking;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod reactive;
pub mod template;
pub mod transport;
pub mod types;

pub use blocking::BlockingHelper;
pub use client::SampleClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use reactive::{Deferred, Flux, FluxStream, Mono, ReactiveHelper, Subscription};
pub use template::{Exchange, PathTemplate, Route};
pub use transport::{ReqwestTransport, Transport, UreqTransport};
pub use types::{Post, SampleDto};
