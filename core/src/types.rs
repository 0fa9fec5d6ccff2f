//! DTOs exchanged with the `/posts` API.
//!
//! # Design
//! Every field is optional: the identifier stays `None` until the server
//! assigns one, and a partially populated value is still a valid request
//! body. Absent fields serialize as `null` (not omitted) so the bytes on the
//! wire are stable for body-matching expectations.

use serde::{Deserialize, Serialize};

/// The sample resource behind `/posts/{postId}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl SampleDto {
    pub fn new(id: i64, user_id: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            user_id: Some(user_id.into()),
        }
    }

    /// A value ready to be created; the server assigns `id`.
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: Some(user_id.into()),
        }
    }
}

/// A post in the shape served by JSONPlaceholder-style APIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl Post {
    pub fn new(user_id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            id: None,
            title: Some(title.into()),
            body: Some(body.into()),
        }
    }
}
