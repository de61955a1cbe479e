// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
mod handler;

use std::{convert::Infallible, io, sync::Arc};

use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, sync::watch};
use tracing::{debug, info, warn};

use crate::resolver::TimezoneResolver;

pub use handler::handle;

/// Accept connections on `listener` until `shutdown` changes, serving every request with
/// [`handle`].
///
/// In-flight connections are shut down gracefully.
pub async fn serve(
    listener: TcpListener,
    resolver: Arc<TimezoneResolver>,
    mut shutdown: watch::Receiver<()>,
) -> io::Result<()> {
    info!("Listening on http://{}", listener.local_addr()?);

    loop {
        let (tcp_stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Failed to accept connection: {}", err);
                    continue;
                },
            },
            _ = shutdown.changed() => break,
        };

        let resolver = resolver.clone();
        let mut shutdown_signal = shutdown.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let resolver = resolver.clone();
                async move { Ok::<_, Infallible>(handle(&resolver, req).await) }
            });

            let conn = http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service);
            tokio::pin!(conn);

            loop {
                tokio::select! {
                    res = conn.as_mut() => {
                        if let Err(err) = res {
                            debug!("Connection from {} closed with error: {}", remote_addr, err);
                        }
                        break;
                    },
                    _ = shutdown_signal.changed() => conn.as_mut().graceful_shutdown(),
                }
            }
        });
    }

    info!("Server stopped");
    Ok(())
}
