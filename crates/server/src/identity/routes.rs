// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use super::{Error, Pool};

use std::sync::Arc;

use gatehouse_type::identity::{
    CodeDelivery, ConfirmForgotPasswordRequest, ConfirmSignUpRequest, SignInRequest,
    SignUpRequest, SignUpResponse, UserRequest,
};
use gatehouse_type::Tokens;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDeliveryResponse {
    pub code_delivery_details: CodeDelivery,
}

fn report(op: &'static str, e: Error) -> Error {
    match &e {
        Error::Internal(e) => error!(target: "app::identity", op, "{e:#}"),
        e => debug!(target: "app::identity", op, kind = e.kind(), "{e}"),
    }
    e
}

pub async fn sign_up(
    Extension(pool): Extension<Arc<Pool>>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<SignUpResponse>, Error> {
    pool.sign_up(req)
        .await
        .map(Json)
        .map_err(|e| report("sign-up", e))
}

pub async fn confirm_sign_up(
    Extension(pool): Extension<Arc<Pool>>,
    Json(req): Json<ConfirmSignUpRequest>,
) -> Result<StatusCode, Error> {
    pool.confirm_sign_up(req)
        .await
        .map(|()| StatusCode::OK)
        .map_err(|e| report("confirm-sign-up", e))
}

pub async fn resend_code(
    Extension(pool): Extension<Arc<Pool>>,
    Json(req): Json<UserRequest>,
) -> Result<Json<CodeDeliveryResponse>, Error> {
    pool.resend_confirmation_code(req)
        .await
        .map(|code_delivery_details| {
            Json(CodeDeliveryResponse {
                code_delivery_details,
            })
        })
        .map_err(|e| report("resend-code", e))
}

pub async fn sign_in(
    Extension(pool): Extension<Arc<Pool>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Tokens>, Error> {
    pool.sign_in(req)
        .await
        .map(Json)
        .map_err(|e| report("sign-in", e))
}

pub async fn forgot_password(
    Extension(pool): Extension<Arc<Pool>>,
    Json(req): Json<UserRequest>,
) -> Result<Json<CodeDeliveryResponse>, Error> {
    pool.forgot_password(req)
        .await
        .map(|code_delivery_details| {
            Json(CodeDeliveryResponse {
                code_delivery_details,
            })
        })
        .map_err(|e| report("forgot-password", e))
}

pub async fn confirm_forgot_password(
    Extension(pool): Extension<Arc<Pool>>,
    Json(req): Json<ConfirmForgotPasswordRequest>,
) -> Result<StatusCode, Error> {
    pool.confirm_forgot_password(req)
        .await
        .map(|()| StatusCode::OK)
        .map_err(|e| report("confirm-forgot-password", e))
}

/// Routes of the identity endpoints, relative to `/identity`.
pub fn routes() -> Router {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/confirm-sign-up", post(confirm_sign_up))
        .route("/resend-code", post(resend_code))
        .route("/sign-in", post(sign_in))
        .route("/forgot-password", post(forgot_password))
        .route("/confirm-forgot-password", post(confirm_forgot_password))
}
