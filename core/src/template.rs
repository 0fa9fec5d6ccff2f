//! Path templates and endpoint declarations.
//!
//! An [`Exchange`] pairs an HTTP method with a path template such as
//! `/posts/{postId}`. Turning it into an `HttpRequest` substitutes every
//! placeholder from the supplied bindings; a placeholder without a binding is
//! rejected before any request exists.

use std::fmt::Write;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed URL path with named `{placeholders}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, ApiError> {
        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find(['{', '}']) {
            if rest.as_bytes()[open] == b'}' {
                return Err(malformed(template));
            }
            let close = rest[open..].find('}').ok_or_else(|| malformed(template))? + open;
            let name = &rest[open + 1..close];
            if name.is_empty() || name.contains('{') {
                return Err(malformed(template));
            }
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            segments.push(Segment::Variable(name.to_string()));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder. Values are percent-encoded as single
    /// path segments; unused bindings are ignored.
    pub fn expand(&self, bindings: &[(&str, String)]) -> Result<String, ApiError> {
        let mut path = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Variable(name) => {
                    let value = bindings
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value)
                        .ok_or_else(|| {
                            ApiError::Construction(format!("missing path variable {name}"))
                        })?;
                    encode_segment(&mut path, value);
                }
            }
        }
        Ok(path)
    }
}

fn malformed(template: &str) -> ApiError {
    ApiError::Construction(format!("malformed path template {template:?}"))
}

fn encode_segment(out: &mut String, value: &str) {
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
}

/// Declaration of one endpoint: a method and a path template relative to the
/// client's base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub method: HttpMethod,
    pub path: &'static str,
}

impl Exchange {
    pub const fn get(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Get,
            path,
        }
    }

    pub const fn post(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Post,
            path,
        }
    }

    pub const fn put(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Put,
            path,
        }
    }

    pub const fn delete(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Delete,
            path,
        }
    }

    /// Parse the template and check that it declares exactly `variables`,
    /// in order.
    pub fn route(&self, variables: &[&str]) -> Result<Route, ApiError> {
        let template = PathTemplate::parse(self.path)?;
        let declared: Vec<&str> = template.variables().collect();
        if declared != variables {
            return Err(ApiError::Construction(format!(
                "path template {:?} declares {declared:?}, expected {variables:?}",
                self.path
            )));
        }
        Ok(Route {
            method: self.method,
            template,
        })
    }

    /// Build the request for this endpoint against the configured base URL.
    pub fn request(
        &self,
        config: &ClientConfig,
        bindings: &[(&str, String)],
    ) -> Result<HttpRequest, ApiError> {
        let route = Route {
            method: self.method,
            template: PathTemplate::parse(self.path)?,
        };
        route.request(config, bindings)
    }
}

/// An [`Exchange`] whose template has already been parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: HttpMethod,
    template: PathTemplate,
}

impl Route {
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn request(
        &self,
        config: &ClientConfig,
        bindings: &[(&str, String)],
    ) -> Result<HttpRequest, ApiError> {
        let path = self.template.expand(bindings)?;
        let url = config.resolve_url(&path)?;
        Ok(HttpRequest::new(self.method, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literals_and_variables() {
        let template = PathTemplate::parse("/users/{userId}/posts/{postId}").unwrap();
        assert_eq!(template.variables().collect::<Vec<_>>(), vec!["userId", "postId"]);
        assert_eq!(
            template
                .expand(&[("postId", "7".into()), ("userId", "3".into())])
                .unwrap(),
            "/users/3/posts/7"
        );
    }

    #[test]
    fn template_without_variables_expands_to_itself() {
        let template = PathTemplate::parse("/posts").unwrap();
        assert_eq!(template.variables().count(), 0);
        assert_eq!(template.expand(&[]).unwrap(), "/posts");
    }

    #[test]
    fn missing_binding_is_a_construction_failure() {
        let template = PathTemplate::parse("/posts/{postId}").unwrap();
        let err = template.expand(&[("id", "1".into())]).unwrap_err();
        assert_eq!(err, ApiError::Construction("missing path variable postId".into()));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        for bad in ["/posts/{postId", "/posts/postId}", "/posts/{}", "/a/{b{c}}"] {
            assert!(
                matches!(PathTemplate::parse(bad), Err(ApiError::Construction(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn values_are_percent_encoded() {
        let template = PathTemplate::parse("/search/{q}").unwrap();
        assert_eq!(
            template.expand(&[("q", "a b/c".into())]).unwrap(),
            "/search/a%20b%2Fc"
        );
    }

    #[test]
    fn exchange_builds_request_against_base_url() {
        const GET_ONE: Exchange = Exchange::get("/posts/{postId}");
        let config = ClientConfig::new().with_base_url("http://localhost:8099");
        let req = GET_ONE.request(&config, &[("postId", "1".into())]).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8099/posts/1");
        assert!(req.body.is_none());
    }

    #[test]
    fn route_checks_declared_variables() {
        let route = Exchange::get("/posts/{postId}").route(&["postId"]).unwrap();
        assert_eq!(route.method, HttpMethod::Get);
        assert_eq!(route.template().variables().collect::<Vec<_>>(), vec!["postId"]);

        let config = ClientConfig::new().with_base_url("http://localhost:8099");
        let req = route.request(&config, &[("postId", "3".into())]).unwrap();
        assert_eq!(req.url, "http://localhost:8099/posts/3");

        for (path, variables) in [
            ("/posts/{id}", &["postId"][..]),
            ("/posts", &["postId"][..]),
            ("/posts/{postId}", &[][..]),
            ("/posts/{postId", &["postId"][..]),
        ] {
            assert!(
                matches!(Exchange::get(path).route(variables), Err(ApiError::Construction(_))),
                "{path} with {variables:?} should be rejected"
            );
        }
    }

    #[test]
    fn exchange_without_base_url_fails() {
        let err = Exchange::delete("/posts/{postId}")
            .request(&ClientConfig::new(), &[("postId", "1".into())])
            .unwrap_err();
        assert!(matches!(err, ApiError::Construction(_)));
    }
}
