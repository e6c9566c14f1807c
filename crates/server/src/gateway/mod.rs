// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

//! The GraphQL gateway: validates requests against the schema and dispatches
//! root fields to their resolvers.

mod resolvers;
mod schema;

pub use resolvers::{todos, Action, Outcome, Resolver, Resolvers, RootType};
pub use schema::{typed, Schema, DEFAULT_SCHEMA};

use super::auth::Caller;
use super::store::Table;

use std::fmt;
use std::sync::Arc;

use gatehouse_type::graphql::{Error, ErrorType, PathSegment, Request, Response};

use async_graphql::dynamic::{self, Field, FieldFuture, FieldValue, ResolverContext};
use async_graphql::{ErrorExtensionValues, ServerError, Value as GraphQLValue, Variables};
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Error extension carrying the [ErrorType] of field errors.
const ERROR_TYPE: &str = "errorType";

fn payload(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

fn arguments(ctx: &ResolverContext<'_>) -> Result<Map<String, Value>, String> {
    ctx.args
        .iter()
        .map(|(name, value)| {
            let value = value
                .as_value()
                .clone()
                .into_json()
                .map_err(|e| format!("invalid argument `{name}`: {e}"))?;
            Ok((name.to_string(), value))
        })
        .collect()
}

/// Reports a failure of the field being resolved and leaves it `null`.
fn field_error(ctx: &ResolverContext<'_>, error_type: ErrorType, message: impl fmt::Display) {
    let mut extensions = ErrorExtensionValues::default();
    extensions.set(ERROR_TYPE, format!("{error_type:?}"));
    let mut error = ServerError::new(message.to_string(), Some(ctx.item.pos));
    error.extensions = Some(extensions);
    ctx.add_error(ctx.set_error_path(error));
}

async fn act(table: &dyn Table, field: &str, action: Action) -> Result<Outcome, String> {
    info!(target: "app::gateway", field, ?action, "store action");
    let outcome = match action {
        Action::Get(id) => table.get(&id).await.map(Outcome::Item),
        Action::Put(record) => table.put(record).await.map(|record| Outcome::Item(Some(record))),
        Action::Delete(id) => table.delete(&id).await.map(Outcome::Item),
        Action::Scan => table.scan().await.map(Outcome::Items),
    }
    .map_err(|e| {
        warn!(target: "app::gateway", field, "store action failed: {e}");
        e.to_string()
    })?;
    info!(target: "app::gateway", field, ?outcome, "store result");
    Ok(outcome)
}

/// Resolves a root field: its arguments become a store action and the
/// outcome becomes its value. Failures resolve to `null` with a
/// [ErrorType::StoreError].
async fn resolve(
    ctx: ResolverContext<'_>,
    root: RootType,
    resolver: Option<Resolver>,
    abstract_type: bool,
    table: &dyn Table,
) -> async_graphql::Result<Option<FieldValue<'static>>> {
    let field = ctx.item.node.name.node.as_str();
    let Some(resolver) = resolver else {
        debug!(target: "app::gateway", "no resolver bound to `{root}.{field}`");
        return Ok(None);
    };
    let outcome = match arguments(&ctx).and_then(|args| (resolver.request)(&args)) {
        Ok(action) => act(table, field, action).await,
        Err(e) => Err(e),
    };
    let value = outcome.and_then(|outcome| {
        GraphQLValue::from_json((resolver.response)(outcome)).map_err(|e| e.to_string())
    });
    match value {
        Ok(value) if abstract_type => Ok(Some(typed(value))),
        Ok(value) => Ok(Some(FieldValue::value(value))),
        Err(e) => {
            field_error(&ctx, ErrorType::StoreError, e);
            Ok(None)
        }
    }
}

fn error(e: ServerError) -> Error {
    let error_type = e
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get(ERROR_TYPE))
        .and_then(|ty| serde_json::from_value(ty.clone().into_json().ok()?).ok());
    let path = (!e.path.is_empty()).then(|| {
        e.path
            .into_iter()
            .map(|segment| match segment {
                async_graphql::PathSegment::Field(name) => PathSegment::Field(name),
                async_graphql::PathSegment::Index(i) => PathSegment::Index(i),
            })
            .collect::<Vec<_>>()
    });
    Error {
        message: e.message,
        // Errors raised while resolving carry a path; the rest reject the
        // document before execution.
        error_type: Some(error_type.unwrap_or(if path.is_some() {
            ErrorType::InternalFailure
        } else {
            ErrorType::ValidationError
        })),
        path,
    }
}

fn response(res: async_graphql::Response) -> Response {
    let data = match res.data.into_json() {
        Ok(Value::Object(data)) => Some(data),
        _ => None,
    };
    Response {
        data,
        errors: res.errors.into_iter().map(error).collect(),
    }
}

pub struct Gateway {
    schema: dynamic::Schema,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    /// Binds `resolvers` to the root fields of `schema`. Root fields without
    /// a resolver resolve to `null`.
    pub fn new(schema: &Schema, resolvers: Resolvers, table: Arc<dyn Table>) -> anyhow::Result<Self> {
        let schema = schema.executable(|root, name, ty, abstract_type| {
            let resolver = resolvers.get(&(root, name.to_string())).copied();
            let table = table.clone();
            Field::new(name, ty, move |ctx| {
                let table = table.clone();
                FieldFuture::new(async move {
                    resolve(ctx, root, resolver, abstract_type, table.as_ref()).await
                })
            })
        })?;
        Ok(Self { schema })
    }

    /// Validates and executes `req` on behalf of `caller`.
    pub async fn execute(&self, caller: &Caller, req: Request) -> Response {
        info!(
            target: "app::gateway",
            caller = caller.subject(),
            request = %payload(&req),
            "GraphQL request"
        );
        let Request {
            query,
            operation_name,
            variables,
        } = req;
        let mut request = async_graphql::Request::new(query);
        if let Some(name) = operation_name {
            request = request.operation_name(name);
        }
        if let Some(variables) = variables {
            request = request.variables(Variables::from_json(Value::Object(variables)));
        }
        let res = response(self.schema.execute(request).await);
        info!(target: "app::gateway", response = %payload(&res), "GraphQL response");
        res
    }
}

pub async fn handle(
    Extension(gateway): Extension<Arc<Gateway>>,
    caller: Caller,
    body: Bytes,
) -> impl IntoResponse {
    match serde_json::from_slice::<Request>(&body) {
        Ok(req) => (StatusCode::OK, Json(gateway.execute(&caller, req).await)),
        Err(e) => {
            info!(
                target: "app::gateway",
                caller = caller.subject(),
                body = %String::from_utf8_lossy(&body),
                "malformed GraphQL request: {e}"
            );
            (
                StatusCode::BAD_REQUEST,
                Json(Response::error(Error::new(
                    ErrorType::BadRequestException,
                    format!("Unable to parse GraphQL request body: {e}"),
                ))),
            )
        }
    }
}
