// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

#![warn(rust_2018_idioms, unused_lifetimes, unused_qualifications, clippy::all)]
#![forbid(unsafe_code)]

mod entity;
mod identity;
mod todo;

pub use entity::*;
pub use identity::*;
pub use todo::*;

pub use gatehouse_type as types;

pub use anyhow::{Context, Result};
pub use url::Url;

use gatehouse_type::graphql::{Request, Response};
use gatehouse_type::{ClientId, Outputs};

/// Credentials presented to the GraphQL endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Auth {
    /// A bearer token issued by the identity pool.
    Token(String),
    /// The deployment API key.
    ApiKey(String),
    None,
}

#[derive(Debug)]
pub struct Client {
    inner: ureq::Agent,
    root: Url,
}

impl Client {
    pub fn builder(url: Url) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.root.join(path).context("failed to construct URL")
    }

    /// Identity operations on behalf of the pool client `client_id`.
    pub fn identity<'a>(&'a self, client_id: &'a ClientId) -> Identity<'a> {
        Identity::new(Entity::new(self, "identity"), client_id)
    }

    /// Todo operations authenticated with `auth`.
    pub fn todos<'a>(&'a self, auth: &'a Auth) -> Todos<'a> {
        Todos::new(self, auth)
    }

    /// Sends a raw GraphQL request. Responses carrying GraphQL errors are
    /// returned as-is, whatever their HTTP status.
    pub fn graphql(&self, auth: &Auth, req: &Request) -> Result<Response> {
        Entity::new(self, "graphql").graphql(auth, req)
    }

    /// Fetches the deployment outputs.
    pub fn outputs(&self, auth: &Auth) -> Result<Outputs> {
        Entity::new(self, "outputs").get_json(auth)
    }
}

pub struct ClientBuilder {
    inner: ureq::AgentBuilder,
    url: Url,
}

impl ClientBuilder {
    pub fn new(url: Url) -> Self {
        Self {
            inner: ureq::AgentBuilder::new(),
            url,
        }
    }

    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        Self {
            inner: self.inner.timeout(timeout),
            ..self
        }
    }

    pub fn build(self) -> Client {
        Client {
            inner: self.inner.build(),
            root: self.url,
        }
    }
}
