// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use super::{Auth, Client, Result};

use std::fmt;

use gatehouse_type::graphql::{Request, Response};

use anyhow::{anyhow, Context};
use http::header::AUTHORIZATION;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-api-key";

/// Error reported by the identity pool, e.g. `UsernameExistsException`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServiceError {
    #[serde(rename = "__type")]
    pub kind: String,
    pub message: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ServiceError {}

fn parse_ureq_error(e: ureq::Error) -> anyhow::Error {
    match e {
        ureq::Error::Status(code, res) => match res.into_json::<ServiceError>() {
            Ok(err) => anyhow::Error::new(err)
                .context(format!("request failed with status code `{code}`")),
            Err(_) => anyhow!("request failed with status code `{code}`"),
        },

        ureq::Error::Transport(e) => anyhow::Error::new(e).context("transport layer failure"),
    }
}

fn authorize(req: ureq::Request, auth: &Auth) -> ureq::Request {
    match auth {
        Auth::Token(token) => req.set(AUTHORIZATION.as_str(), &format!("Bearer {token}")),
        Auth::ApiKey(key) => req.set(API_KEY_HEADER, key),
        Auth::None => req,
    }
}

/// An endpoint of the service.
#[derive(Clone, Debug)]
pub struct Entity<'a> {
    client: &'a Client,
    path: String,
}

impl<'a> Entity<'a> {
    pub fn new(client: &'a Client, path: &str) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    /// Returns a child [Entity] rooted at `path`.
    pub fn child(&self, path: &str) -> Self {
        Self {
            client: self.client,
            path: format!("{}/{}", self.path, path),
        }
    }

    pub fn post_json<T: DeserializeOwned>(&self, val: &impl Serialize) -> Result<T> {
        let url = self.client.url(&self.path)?;
        let res = self
            .client
            .inner
            .post(url.as_str())
            .send_json(val)
            .map_err(parse_ureq_error)
            .context("POST request failed")?;
        res.into_json().context("failed to decode JSON")
    }

    /// Like [Self::post_json] for endpoints that reply with an empty body.
    pub fn post(&self, val: &impl Serialize) -> Result<()> {
        let url = self.client.url(&self.path)?;
        let res = self
            .client
            .inner
            .post(url.as_str())
            .send_json(val)
            .map_err(parse_ureq_error)
            .context("POST request failed")?;
        match StatusCode::from_u16(res.status()) {
            Ok(status) if status.is_success() => Ok(()),
            _ => Err(anyhow!("unexpected status code: {}", res.status())),
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, auth: &Auth) -> Result<T> {
        let url = self.client.url(&self.path)?;
        let res = authorize(self.client.inner.get(url.as_str()), auth)
            .call()
            .map_err(parse_ureq_error)
            .context("GET request failed")?;
        res.into_json().context("failed to decode JSON")
    }

    pub fn graphql(&self, auth: &Auth, req: &Request) -> Result<Response> {
        let url = self.client.url(&self.path)?;
        let res = match authorize(self.client.inner.post(url.as_str()), auth).send_json(req) {
            Ok(res) => res,
            Err(ureq::Error::Status(code, res))
                if matches!(
                    StatusCode::from_u16(code),
                    Ok(StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
                ) =>
            {
                res
            }
            Err(e) => return Err(parse_ureq_error(e)).context("GraphQL request failed"),
        };
        res.into_json()
            .context("failed to decode GraphQL response")
    }
}
