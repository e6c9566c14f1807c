// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    missing_debug_implementations,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications
)]

mod builder;

pub mod auth;
pub mod gateway;
pub mod identity;
pub mod store;

pub use auth::{Caller, TlsConfig};
pub use builder::*;
pub use gateway::Gateway;
pub use identity::Pool;

pub use url;

use std::path::Path;
use std::sync::Arc;

use gatehouse_type::Outputs;

use anyhow::Context as _;
use axum::Router;
use futures::lock::Mutex;
use futures::{AsyncRead, AsyncWrite};
use futures_rustls::TlsAcceptor;
use hyper::server::conn::Http;
use store::{Filesystem, Table};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{info, trace};
use url::Url;

async fn serve(
    stream: impl 'static + Unpin + AsyncRead + AsyncWrite,
    router: Router,
) -> anyhow::Result<()> {
    trace!(target: "app::App::handle", "begin HTTP request serving");
    Http::new()
        .serve_connection(stream.compat(), router)
        .await
        .context("failed to handle request")
}

/// Irrecoverably removes the records and deployment stored at `path`.
/// Fails if there is no store at `path`.
pub async fn destroy(path: impl AsRef<Path>) -> anyhow::Result<()> {
    let store = Filesystem::open_existing(path).await?;
    teardown(&store, Some(&store)).await
}

async fn teardown(table: &dyn Table, store: Option<&Filesystem>) -> anyhow::Result<()> {
    table
        .destroy()
        .await
        .context("failed to destroy record table")?;
    if let Some(store) = store {
        store
            .remove_json(DEPLOYMENT)
            .await
            .context("failed to remove deployment")?;
    }
    info!(target: "app::destroy", "record table destroyed");
    Ok(())
}

pub struct App {
    router: Mutex<Router>,
    tls: Option<TlsAcceptor>,
    outputs: Outputs,
    pool: Arc<Pool>,
    table: Arc<dyn Table>,
    store: Option<Arc<Filesystem>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("tls", &self.tls.is_some())
            .field("outputs", &self.outputs)
            .field("pool", &self.pool)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn builder(url: Url) -> Builder {
        Builder::new(url)
    }

    /// Facts about the provisioned deployment.
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn identity(&self) -> &Arc<Pool> {
        &self.pool
    }

    pub fn table(&self) -> &Arc<dyn Table> {
        &self.table
    }

    /// Tears the deployment down, irrecoverably removing all records.
    pub async fn destroy(&self) -> anyhow::Result<()> {
        teardown(self.table.as_ref(), self.store.as_deref()).await
    }

    pub async fn handle(
        &self,
        stream: impl 'static + Unpin + AsyncRead + AsyncWrite,
    ) -> anyhow::Result<()> {
        let router = self.router.lock().await.clone();
        match &self.tls {
            Some(tls) => {
                trace!(target: "app::App::handle", "begin TLS handshake");
                let stream = tls
                    .accept(stream)
                    .await
                    .context("failed to accept TLS connection")?;
                trace!(target: "app::App::handle", "completed TLS handshake");
                serve(stream, router).await
            }
            None => serve(stream, router).await,
        }
    }
}
