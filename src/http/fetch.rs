// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    header::{ACCEPT, LOCATION, USER_AGENT},
    Method, Request, Uri,
};
use tracing::{debug, trace};
use url::Url;

use crate::{error::FetchError, net::HyperClient, VERSION};

const MAX_REDIRECT_COUNT: u32 = 20;

/// Downloads the mapping file from its canonical URL.
#[derive(Clone)]
pub struct Fetcher {
    client: HyperClient,
    url: String,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: HyperClient, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET the source URL and return its body as text.
    ///
    /// Redirects are followed. The timeout covers the whole exchange including redirects and the
    /// body download.
    pub async fn fetch_text(&self) -> Result<String, FetchError> {
        let start = Instant::now();
        let text = tokio::time::timeout(self.timeout, self.fetch_following_redirects())
            .await
            .map_err(|_| FetchError::Timeout)??;
        debug!(
            "Fetched {} ({} bytes) in {}ms",
            self.url,
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }

    async fn fetch_following_redirects(&self) -> Result<String, FetchError> {
        let mut url = Url::parse(&self.url).map_err(|_| FetchError::InvalidUrl(self.url.clone()))?;
        let mut redirect_count = 0;

        let res = loop {
            let req = build_request(&url)?;
            let res = self
                .client
                .request(req)
                .await
                .map_err(|e| FetchError::Request(e.into()))?;

            if !res.status().is_redirection() {
                break res;
            }

            let location = res
                .headers()
                .get(LOCATION)
                .and_then(|l| l.to_str().ok())
                .map(str::to_string);
            let Some(location) = location else {
                break res;
            };

            redirect_count += 1;
            if redirect_count > MAX_REDIRECT_COUNT {
                return Err(FetchError::TooManyRedirects);
            }

            trace!("Following redirect {} -> {}", url, location);
            url = url
                .join(&location)
                .map_err(|_| FetchError::InvalidUrl(location))?;
        };

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = res.collect().await.map_err(FetchError::Body)?.to_bytes();
        String::from_utf8(bytes.to_vec()).map_err(|_| FetchError::InvalidUtf8)
    }
}

fn build_request(url: &Url) -> Result<Request<Full<Bytes>>, FetchError> {
    let uri: Uri = url
        .as_str()
        .parse()
        .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(USER_AGENT, format!("tzresolve {}", VERSION))
        .header(ACCEPT, "*/*")
        .body(Full::default())
        .map_err(|e| FetchError::Request(e.into()))
}
