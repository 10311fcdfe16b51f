//! Wire types, shared by the JSON and protobuf endpoints.
//!
//! Input JSON uses lower-case names (`link`, `url`, `delete`); output JSON
//! uses the capitalized names (`Links`, `Url`, `Message`).

use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    #[prost(string, tag = "1")]
    #[serde(rename(serialize = "Url", deserialize = "url"), alias = "Url")]
    pub url: String,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Body of `PUT /link.{json,proto}`.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRequest {
    #[prost(message, optional, tag = "1")]
    #[serde(rename(serialize = "Link", deserialize = "link"), alias = "Link")]
    pub link: Option<Link>,
    #[prost(bool, tag = "2")]
    #[serde(rename(serialize = "Delete", deserialize = "delete"), alias = "Delete")]
    pub delete: bool,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Links {
    #[prost(message, repeated, tag = "1")]
    #[serde(rename = "Links", alias = "links")]
    pub links: Vec<Link>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[prost(string, tag = "1")]
    #[serde(rename = "Message", alias = "message")]
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Decoded `PUT /link.*` request.
#[derive(Debug)]
pub struct PutLink {
    pub link: Link,
    pub delete: bool,
}

/// Decoded `GET /list.*` request. Zero means the default limit.
#[derive(Debug)]
pub struct GetLinks {
    pub limit: usize,
}
