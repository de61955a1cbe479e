// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method, Request, StatusCode,
};
use url::Url;

use super::KvStore;
use crate::{error::CacheError, net::HyperClient};

/// Key-value store reached over a REST API.
///
/// `GET {base}/{key}` reads a value (404 is a miss) and
/// `PUT {base}/{key}?expiration_ttl={seconds}` writes one, which is the shape of the Cloudflare
/// Workers KV API.
pub struct RemoteKv {
    client: HyperClient,
    base_url: String,
    token: Option<String>,
}

impl RemoteKv {
    pub fn new(client: HyperClient, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn value_url(&self, key: &str) -> Result<Url, CacheError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| CacheError::Request(e.into()))?;
        url.path_segments_mut()
            .map_err(|_| CacheError::Request(format!("Invalid base URL: {}", self.base_url).into()))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        url: &Url,
        body: Full<Bytes>,
    ) -> Result<Request<Full<Bytes>>, CacheError> {
        let mut req = Request::builder().method(method).uri(url.as_str());
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        req.header(CONTENT_TYPE, "text/plain")
            .body(body)
            .map_err(|e| CacheError::Request(e.into()))
    }
}

#[async_trait]
impl KvStore for RemoteKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let url = self.value_url(key)?;
        let req = self.request(Method::GET, &url, Full::default())?;
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| CacheError::Request(e.into()))?;

        match res.status() {
            StatusCode::OK => {
                let bytes = res
                    .collect()
                    .await
                    .map_err(|e| CacheError::Request(e.into()))?
                    .to_bytes();
                String::from_utf8(bytes.to_vec())
                    .map(Some)
                    .map_err(|_| CacheError::Corrupt(key.to_string()))
            },
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(CacheError::Status(status)),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut url = self.value_url(key)?;
        url.query_pairs_mut()
            .append_pair("expiration_ttl", &ttl.as_secs().to_string());
        let req = self.request(Method::PUT, &url, Full::from(Bytes::from(value.to_string())))?;
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| CacheError::Request(e.into()))?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(CacheError::Status(res.status()))
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
