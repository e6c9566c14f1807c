// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum Error {
    ResourceNotFound,
    UsernameExists,
    InvalidPassword(&'static str),
    InvalidParameter(String),
    CodeMismatch,
    ExpiredCode,
    LimitExceeded,
    NotAuthorized,
    UserNotConfirmed,
    UserNotFound,
    GroupNotFound,
    Internal(anyhow::Error),
}

impl Error {
    /// Name of the error kind as reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ResourceNotFound => "ResourceNotFoundException",
            Error::UsernameExists => "UsernameExistsException",
            Error::InvalidPassword(_) => "InvalidPasswordException",
            Error::InvalidParameter(_) => "InvalidParameterException",
            Error::CodeMismatch => "CodeMismatchException",
            Error::ExpiredCode => "ExpiredCodeException",
            Error::LimitExceeded => "LimitExceededException",
            Error::NotAuthorized => "NotAuthorizedException",
            Error::UserNotConfirmed => "UserNotConfirmedException",
            Error::UserNotFound => "UserNotFoundException",
            Error::GroupNotFound => "ResourceNotFoundException",
            Error::Internal(_) => "InternalErrorException",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::ResourceNotFound | Error::UserNotFound | Error::GroupNotFound => {
                StatusCode::NOT_FOUND
            }
            Error::NotAuthorized | Error::UserNotConfirmed => StatusCode::UNAUTHORIZED,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResourceNotFound => write!(f, "Client not registered with this user pool"),
            Error::UsernameExists => write!(f, "An account with the given email already exists"),
            Error::InvalidPassword(reason) => write!(f, "Password does not conform to policy: {reason}"),
            Error::InvalidParameter(reason) => write!(f, "{reason}"),
            Error::CodeMismatch => write!(f, "Invalid verification code provided, please try again"),
            Error::ExpiredCode => write!(f, "Invalid code provided, please request a code again"),
            Error::LimitExceeded => write!(f, "Attempt limit exceeded, please try after some time"),
            Error::NotAuthorized => write!(f, "Incorrect username or password"),
            Error::UserNotConfirmed => write!(f, "User is not confirmed"),
            Error::UserNotFound => write!(f, "Username/client id combination not found"),
            Error::GroupNotFound => write!(f, "Group not found"),
            Error::Internal(_) => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({
                "__type": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
