// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use super::auth::{Authorizer, Caller, TlsConfig};
use super::gateway::{self, todos, Gateway, Schema, DEFAULT_SCHEMA};
use super::identity::{self, Deliver, Log, Pool};
use super::store::{Filesystem, Memory, Table};
use super::App;

use std::path::PathBuf;
use std::sync::Arc;

use gatehouse_type::identity::random_lowercase;
use gatehouse_type::{unix_now, ApiKey, ClientId, Outputs, PoolId};

use anyhow::Context;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::lock::Mutex;
use futures_rustls::TlsAcceptor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// Name of the document recording a deployment next to its records.
pub(crate) const DEPLOYMENT: &str = "deployment.json";

/// Identifiers and secrets provisioned once per deployment.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Deployment {
    pool_id: PoolId,
    client_id: ClientId,
    api_id: String,
    api_key: ApiKey,
    token_secret: String,
}

impl Deployment {
    fn provision(region: &str) -> Self {
        Self {
            pool_id: PoolId::generate(region),
            client_id: ClientId::generate(),
            api_id: random_lowercase(26),
            api_key: ApiKey::provision(unix_now()),
            token_secret: STANDARD.encode(rand::random::<[u8; 32]>()),
        }
    }
}

async fn outputs(_: Caller, Extension(outputs): Extension<Arc<Outputs>>) -> Json<Outputs> {
    Json(outputs.as_ref().clone())
}

/// [App] builder.
#[derive(Debug)]
pub struct Builder {
    url: Url,
    store: Option<PathBuf>,
    schema: Option<String>,
    tls: Option<TlsConfig>,
    region: String,
    token_secret: Option<String>,
    api_key: Option<ApiKey>,
    delivery: Arc<dyn Deliver>,
}

impl Builder {
    /// Constructs a new [Builder] for an app reachable at `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            store: None,
            schema: None,
            tls: None,
            region: "local".into(),
            token_secret: None,
            api_key: None,
            delivery: Arc::new(Log),
        }
    }

    /// Keeps records in a directory instead of memory.
    pub fn store(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = Some(path.into());
        self
    }

    /// Serves `sdl` instead of the default Todo schema.
    pub fn schema(mut self, sdl: impl Into<String>) -> Self {
        self.schema = Some(sdl.into());
        self
    }

    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Signs bearer tokens with `secret` instead of a provisioned one.
    pub fn token_secret(mut self, secret: impl Into<String>) -> Self {
        self.token_secret = Some(secret.into());
        self
    }

    /// Accepts `key` instead of a provisioned one.
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sends verification and recovery codes through `delivery`.
    pub fn delivery(mut self, delivery: Arc<dyn Deliver>) -> Self {
        self.delivery = delivery;
        self
    }

    /// Provisions the identity pool, client, record table and API key, and
    /// wires them into the application.
    pub async fn build(self) -> anyhow::Result<App> {
        let schema = Schema::parse(self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA))
            .context("failed to load schema")?;

        let (table, store, deployment): (Arc<dyn Table>, _, _) = match self.store {
            Some(path) => {
                let store = Filesystem::open(&path)
                    .await
                    .with_context(|| format!("failed to open store at `{}`", path.display()))?;
                let deployment = match store
                    .load_json::<Deployment>(DEPLOYMENT)
                    .await
                    .context("failed to load deployment")?
                {
                    Some(deployment) => {
                        debug!(target: "app::Builder::build", pool = %deployment.pool_id, "loaded deployment");
                        deployment
                    }
                    None => {
                        let deployment = Deployment::provision(&self.region);
                        store
                            .save_json(DEPLOYMENT, &deployment)
                            .await
                            .context("failed to save deployment")?;
                        info!(target: "app::Builder::build", pool = %deployment.pool_id, "provisioned deployment");
                        deployment
                    }
                };
                let store = Arc::new(store);
                (store.clone() as Arc<dyn Table>, Some(store), deployment)
            }
            None => (
                Arc::new(Memory::default()) as Arc<dyn Table>,
                None,
                Deployment::provision(&self.region),
            ),
        };

        let api_key = self.api_key.unwrap_or(deployment.api_key);
        let secret = match self.token_secret {
            Some(secret) => secret.into_bytes(),
            None => STANDARD
                .decode(&deployment.token_secret)
                .context("failed to decode token secret")?,
        };
        let pool = Arc::new(Pool::new(
            deployment.pool_id,
            deployment.client_id,
            &secret,
            self.delivery,
        ));

        let outputs = Outputs {
            user_pool_id: pool.id().clone(),
            user_pool_client_id: pool.client_id().clone(),
            graphql_url: self
                .url
                .join("graphql")
                .context("failed to construct GraphQL URL")?,
            api_key: api_key.value.clone(),
            api_id: deployment.api_id,
        };
        if !api_key.is_valid_at(unix_now()) {
            info!(target: "app::Builder::build", key_id = %api_key.id, "API key is outside of its validity window");
        }

        let authorizer = Arc::new(Authorizer::new(pool.clone(), api_key));
        let gateway = Arc::new(
            Gateway::new(&schema, todos(), table.clone()).context("failed to build GraphQL schema")?,
        );
        let router = Router::new()
            .route("/graphql", post(gateway::handle))
            .route("/outputs", get(self::outputs))
            .nest("/identity", identity::routes())
            .layer(Extension(gateway))
            .layer(Extension(authorizer))
            .layer(Extension(pool.clone()))
            .layer(Extension(Arc::new(outputs.clone())));

        Ok(App {
            router: Mutex::new(router),
            tls: self
                .tls
                .map(|tls| TlsAcceptor::from(Arc::<rustls::ServerConfig>::from(tls))),
            outputs,
            pool,
            table,
            store,
        })
    }
}
