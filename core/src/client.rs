//! Declarative client for the `/posts` interface.
//!
//! # Design
//! Each endpoint is declared once as an [`Exchange`] constant. `SampleClient`
//! adapts those declarations: every operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`, and the plain operation composes the two around a
//! [`Transport`] call. Building and parsing never touch the network.
//!
//! The declarations are parsed into [`Route`]s once, when the client is
//! created. A declaration that fails to parse, or that does not declare the
//! variables its operation binds, makes every `build_*` fail with
//! `ApiError::Construction`.

use tracing::warn;

use crate::codec;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{check_status, HttpRequest, HttpResponse};
use crate::template::{Exchange, Route};
use crate::transport::{Transport, UreqTransport};
use crate::types::SampleDto;

pub const GET_SAMPLE: Exchange = Exchange::get("/posts/{postId}");
pub const POST_SAMPLE: Exchange = Exchange::post("/posts");
pub const PUT_SAMPLE: Exchange = Exchange::put("/posts");
pub const DELETE_SAMPLE: Exchange = Exchange::delete("/posts/{postId}");

#[derive(Debug, Clone)]
struct Routes {
    get: Route,
    post: Route,
    put: Route,
    delete: Route,
}

impl Routes {
    fn parse() -> Result<Self, ApiError> {
        Ok(Self {
            get: GET_SAMPLE.route(&["postId"])?,
            post: POST_SAMPLE.route(&[])?,
            put: PUT_SAMPLE.route(&[])?,
            delete: DELETE_SAMPLE.route(&["postId"])?,
        })
    }
}

/// Client for the `/posts` interface, generic over the blocking transport.
#[derive(Clone)]
pub struct SampleClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
    routes: Result<Routes, ApiError>,
}

impl SampleClient<UreqTransport> {
    pub fn new(base_url: &str) -> Self {
        Self::from_config(ClientConfig::new().with_base_url(base_url))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> SampleClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            routes: Routes::parse(),
        }
    }

    fn prepare(
        &self,
        route: fn(&Routes) -> &Route,
        bindings: &[(&str, String)],
    ) -> Result<HttpRequest, ApiError> {
        let routes = self.routes.as_ref().map_err(Clone::clone)?;
        let mut req = route(routes).request(&self.config, bindings)?;
        req.headers = req.headers.merged_over(&self.config.default_headers);
        req.headers.validate()?;
        Ok(req)
    }

    pub fn build_get_sample(&self, post_id: i64) -> Result<HttpRequest, ApiError> {
        self.prepare(|r| &r.get, &[("postId", post_id.to_string())])
    }

    pub fn build_post_sample(&self, param: &SampleDto) -> Result<HttpRequest, ApiError> {
        let body = codec::encode(param)?;
        Ok(self.prepare(|r| &r.post, &[])?.with_json_body(body))
    }

    pub fn build_put_sample(&self, param: &SampleDto) -> Result<HttpRequest, ApiError> {
        let body = codec::encode(param)?;
        Ok(self.prepare(|r| &r.put, &[])?.with_json_body(body))
    }

    pub fn build_delete_sample(&self, post_id: i64) -> Result<HttpRequest, ApiError> {
        self.prepare(|r| &r.delete, &[("postId", post_id.to_string())])
    }

    pub fn parse_get_sample(&self, response: HttpResponse) -> Result<SampleDto, ApiError> {
        check_status(&response)?;
        codec::decode(&response.body)
    }

    pub fn parse_post_sample(&self, response: HttpResponse) -> Result<SampleDto, ApiError> {
        check_status(&response)?;
        codec::decode(&response.body)
    }

    pub fn parse_put_sample(&self, response: HttpResponse) -> Result<SampleDto, ApiError> {
        check_status(&response)?;
        codec::decode(&response.body)
    }

    /// Any body on a successful delete is ignored.
    pub fn parse_delete_sample(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn get_sample(&self, post_id: i64) -> Result<SampleDto, ApiError> {
        let req = self.build_get_sample(post_id)?;
        self.call(req, |c, resp| c.parse_get_sample(resp))
    }

    pub fn post_sample(&self, param: &SampleDto) -> Result<SampleDto, ApiError> {
        let req = self.build_post_sample(param)?;
        self.call(req, |c, resp| c.parse_post_sample(resp))
    }

    pub fn put_sample(&self, param: &SampleDto) -> Result<SampleDto, ApiError> {
        let req = self.build_put_sample(param)?;
        self.call(req, |c, resp| c.parse_put_sample(resp))
    }

    pub fn delete_sample(&self, post_id: i64) -> Result<(), ApiError> {
        let req = self.build_delete_sample(post_id)?;
        self.call(req, |c, resp| c.parse_delete_sample(resp))
    }

    fn call<R>(
        &self,
        req: HttpRequest,
        parse: impl FnOnce(&Self, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let method = req.method;
        let url = req.url.clone();
        let result = self
            .transport
            .execute(req)
            .and_then(|resp| parse(self, resp));
        if let Err(err) = &result {
            warn!(%method, %url, error = %err, "sample call failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::{Headers, HttpMethod, CONTENT_TYPE};

    fn client() -> SampleClient {
        SampleClient::new("http://localhost:8099")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Headers::new(),
            body: body.to_string(),
        }
    }

    /// Replays a canned response and remembers every request it saw.
    struct Canned {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Transport for Canned {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.seen.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    #[test]
    fn declared_endpoints_parse_with_their_variables() {
        let routes = Routes::parse().unwrap();
        for (route, exchange, variables) in [
            (&routes.get, GET_SAMPLE, &["postId"][..]),
            (&routes.post, POST_SAMPLE, &[][..]),
            (&routes.put, PUT_SAMPLE, &[][..]),
            (&routes.delete, DELETE_SAMPLE, &["postId"][..]),
        ] {
            assert_eq!(route.method, exchange.method, "{}", exchange.path);
            assert_eq!(
                route.template().variables().collect::<Vec<_>>(),
                variables,
                "{}",
                exchange.path
            );
        }
        assert!(client().routes.is_ok());
    }

    #[test]
    fn build_get_sample_produces_correct_request() {
        let req = client().build_get_sample(1).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8099/posts/1");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_post_sample_encodes_body() {
        let req = client()
            .build_post_sample(&SampleDto::with_user_id("userId"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8099/posts");
        assert_eq!(req.headers.get(CONTENT_TYPE), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(r#"{"id":null,"userId":"userId"}"#));
    }

    #[test]
    fn build_put_sample_encodes_body() {
        let req = client()
            .build_put_sample(&SampleDto::new(1, "updatedUserId"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:8099/posts");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["id"], 1);
        assert_eq!(body["userId"], "updatedUserId");
    }

    #[test]
    fn build_delete_sample_has_no_body() {
        let req = client().build_delete_sample(1).unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:8099/posts/1");
        assert!(req.body.is_none());
    }

    #[test]
    fn default_headers_are_attached() {
        let config = ClientConfig::new()
            .with_base_url("http://localhost:8099")
            .with_header("x-client", "httpclients");
        let client = SampleClient::from_config(config);
        let req = client.build_post_sample(&SampleDto::default()).unwrap();
        assert_eq!(req.headers.get("x-client"), Some("httpclients"));
        assert_eq!(req.headers.get(CONTENT_TYPE), Some("application/json"));
    }

    #[test]
    fn invalid_default_header_fails_before_io() {
        let config = ClientConfig::new()
            .with_base_url("http://localhost:8099")
            .with_header("bad header", "x");
        let err = SampleClient::from_config(config)
            .build_get_sample(1)
            .unwrap_err();
        assert!(matches!(err, ApiError::Construction(_)));
    }

    #[test]
    fn parse_get_sample_success() {
        let dto = client()
            .parse_get_sample(response(200, r#"{"id":1,"userId":"userId"}"#))
            .unwrap();
        assert_eq!(dto, SampleDto::new(1, "userId"));
    }

    #[test]
    fn parse_get_sample_not_found() {
        let err = client().parse_get_sample(response(404, "")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn parse_post_sample_server_error() {
        let err = client()
            .parse_post_sample(response(500, "internal error"))
            .unwrap_err();
        assert!(matches!(err, ApiError::ServerError { status: 500, .. }));
    }

    #[test]
    fn parse_put_sample_bad_json() {
        let err = client().parse_put_sample(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn parse_delete_sample_tolerates_empty_and_non_empty_bodies() {
        assert!(client().parse_delete_sample(response(204, "")).is_ok());
        assert!(client().parse_delete_sample(response(200, "{}")).is_ok());
    }

    #[test]
    fn get_sample_round_trips_through_transport() {
        let canned = Canned {
            response: response(200, r#"{"id":1,"userId":"userId"}"#),
            seen: Mutex::new(Vec::new()),
        };
        let config = ClientConfig::new().with_base_url("http://mock");
        let client = SampleClient::with_transport(config, &canned);

        assert_eq!(client.get_sample(1).unwrap(), SampleDto::new(1, "userId"));
        assert_eq!(client.get_sample(1).unwrap(), SampleDto::new(1, "userId"));

        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|r| r.url == "http://mock/posts/1"));
    }

    #[test]
    fn missing_base_url_fails_before_io() {
        let canned = Canned {
            response: response(200, "{}"),
            seen: Mutex::new(Vec::new()),
        };
        let client = SampleClient::with_transport(ClientConfig::new(), &canned);
        let err = client.get_sample(5).unwrap_err();
        assert!(matches!(err, ApiError::Construction(_)));
        assert!(canned.seen.lock().unwrap().is_empty());
    }
}
