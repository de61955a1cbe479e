// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::{error::Error, sync::Arc, time::Duration};

use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use rustls::{crypto::ring, ClientConfig, RootCertStore};
use webpki_roots::TLS_SERVER_ROOTS;

pub type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

fn tls_config() -> Result<ClientConfig, rustls::Error> {
    let mut root_certificates = RootCertStore::empty();

    for cert in TLS_SERVER_ROOTS.iter().cloned() {
        root_certificates.roots.push(cert)
    }

    Ok(
        ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_certificates)
            .with_no_client_auth(),
    )
}

/// Build the HTTP(S) client shared by the table fetcher and the remote key-value store.
///
/// Plain `http://` URLs are allowed so local mirrors and test servers work.
pub fn build_client() -> Result<HyperClient, Box<dyn Error + Send + Sync>> {
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config()?)
        .https_or_http()
        .enable_http1()
        .build();

    Ok(Client::builder(TokioExecutor::new())
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_timer(TokioTimer::new())
        .build(https))
}
