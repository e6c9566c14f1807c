// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

mod tls;

pub use tls::Config as TlsConfig;

use super::identity::Pool;

use std::sync::Arc;

use gatehouse_type::graphql::{self, ErrorType};
use gatehouse_type::{unix_now, ApiKey, Claims};

use axum::extract::{Extension, FromRequest, RequestParts};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
use tracing::{debug, error, trace};

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// An authorized caller.
#[derive(Clone, Debug)]
pub enum Caller {
    /// A user presenting a bearer token issued by the identity pool.
    User(Claims),
    /// A service presenting the static API key.
    ApiKey,
}

impl Caller {
    pub fn subject(&self) -> &str {
        match self {
            Caller::User(claims) => &claims.sub,
            Caller::ApiKey => "api-key",
        }
    }
}

#[derive(Debug)]
pub enum Rejection {
    Unauthorized,
    Internal,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Rejection::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                graphql::Error::new(
                    ErrorType::UnauthorizedException,
                    "You are not authorized to make this call.",
                ),
            ),
            Rejection::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                graphql::Error::new(ErrorType::InternalFailure, "Authorizer unavailable"),
            ),
        };
        (status, Json(graphql::Response::error(error))).into_response()
    }
}

/// Checks request credentials against the identity pool and the API key.
#[derive(Debug)]
pub struct Authorizer {
    pool: Arc<Pool>,
    api_key: ApiKey,
    clock: fn() -> u64,
}

impl Authorizer {
    pub fn new(pool: Arc<Pool>, api_key: ApiKey) -> Self {
        Self {
            pool,
            api_key,
            clock: unix_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Authorizes a request by its headers. A bearer token is checked first,
    /// the API key second; either one being valid suffices.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Caller, Rejection> {
        if let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            let token = token
                .strip_prefix("Bearer ")
                .or_else(|| token.strip_prefix("bearer "))
                .unwrap_or(token)
                .trim();
            match self.pool.verify(token) {
                Ok(claims) => {
                    trace!(target: "app::auth", sub = %claims.sub, "bearer token accepted");
                    return Ok(Caller::User(claims));
                }
                Err(e) => debug!(target: "app::auth", "bearer token rejected: {e}"),
            }
        }

        if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            if self.api_key.accepts(key, (self.clock)()) {
                trace!(target: "app::auth", "API key accepted");
                return Ok(Caller::ApiKey);
            }
            debug!(target: "app::auth", key_id = %self.api_key.id, "API key rejected");
        }
        Err(Rejection::Unauthorized)
    }
}

#[async_trait]
impl<B: Send> FromRequest<B> for Caller {
    type Rejection = Rejection;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(auth) = req
            .extract::<Extension<Arc<Authorizer>>>()
            .await
            .map_err(|e| {
                error!(target: "app::auth", "authorizer extension missing: {e}");
                Rejection::Internal
            })?;
        auth.authorize(req.headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identity::tests::{confirmed_user, pool};
    use crate::identity::Outbox;

    use std::sync::atomic::{AtomicU64, Ordering};

    use axum::http::HeaderValue;
    use gatehouse_type::DAY;

    static NOW: AtomicU64 = AtomicU64::new(0);

    fn now() -> u64 {
        NOW.load(Ordering::SeqCst)
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(k, v)| {
                (
                    header::HeaderName::from_static(k),
                    HeaderValue::from_str(v).unwrap(),
                )
            })
            .collect()
    }

    #[async_std::test]
    async fn credentials() {
        let outbox = Arc::new(Outbox::default());
        let pool = Arc::new(pool(outbox.clone()));
        let tokens = confirmed_user(&pool, &outbox, &"jane@example.com".parse().unwrap()).await;

        NOW.store(unix_now(), Ordering::SeqCst);
        let key = ApiKey::provision(now());
        let auth = Authorizer::new(pool, key.clone()).with_clock(now);

        assert!(matches!(
            auth.authorize(&HeaderMap::new()),
            Err(Rejection::Unauthorized)
        ));
        assert!(matches!(
            auth.authorize(&headers(&[("authorization", "Bearer nonsense")])),
            Err(Rejection::Unauthorized)
        ));
        assert!(matches!(
            auth.authorize(&headers(&[("x-api-key", "da2-wrong")])),
            Err(Rejection::Unauthorized)
        ));

        let bearer = format!("Bearer {}", tokens.access_token);
        match auth.authorize(&headers(&[("authorization", &bearer)])) {
            Ok(Caller::User(claims)) => assert_eq!(claims.email.as_str(), "jane@example.com"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            auth.authorize(&headers(&[("authorization", &tokens.id_token)])),
            Ok(Caller::User(_))
        ));
        assert!(matches!(
            auth.authorize(&headers(&[("x-api-key", &key.value)])),
            Ok(Caller::ApiKey)
        ));
        assert!(matches!(
            auth.authorize(&headers(&[
                ("authorization", "Bearer nonsense"),
                ("x-api-key", &key.value)
            ])),
            Ok(Caller::ApiKey)
        ));

        NOW.store(key.created + 30 * DAY, Ordering::SeqCst);
        assert!(matches!(
            auth.authorize(&headers(&[("x-api-key", &key.value)])),
            Err(Rejection::Unauthorized)
        ));
    }
}
