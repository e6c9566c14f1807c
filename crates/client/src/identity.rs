// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use super::{Entity, Result};

use gatehouse_type::identity::{
    CodeDelivery, ConfirmForgotPasswordRequest, ConfirmSignUpRequest, SignInRequest,
    SignUpRequest, SignUpResponse, UserRequest,
};
use gatehouse_type::{ClientId, Email, PhoneNumber, Tokens};

use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeDeliveryResponse {
    code_delivery_details: CodeDelivery,
}

/// Identity pool endpoints, scoped to one pool client.
#[derive(Clone, Debug)]
pub struct Identity<'a> {
    entity: Entity<'a>,
    client_id: &'a ClientId,
}

impl<'a> Identity<'a> {
    pub fn new(entity: Entity<'a>, client_id: &'a ClientId) -> Self {
        Self { entity, client_id }
    }

    pub fn sign_up(
        &self,
        email: &Email,
        password: &str,
        phone_number: Option<&PhoneNumber>,
    ) -> Result<SignUpResponse> {
        self.entity.child("sign-up").post_json(&SignUpRequest {
            client_id: self.client_id.clone(),
            email: email.clone(),
            password: password.into(),
            phone_number: phone_number.cloned(),
        })
    }

    pub fn confirm_sign_up(&self, email: &Email, code: &str) -> Result<()> {
        self.entity.child("confirm-sign-up").post(&ConfirmSignUpRequest {
            client_id: self.client_id.clone(),
            email: email.clone(),
            code: code.into(),
        })
    }

    pub fn resend_code(&self, email: &Email) -> Result<CodeDelivery> {
        self.entity
            .child("resend-code")
            .post_json(&self.user(email))
            .map(|CodeDeliveryResponse { code_delivery_details }| code_delivery_details)
    }

    pub fn sign_in(&self, email: &Email, password: &str) -> Result<Tokens> {
        self.entity.child("sign-in").post_json(&SignInRequest {
            client_id: self.client_id.clone(),
            email: email.clone(),
            password: password.into(),
        })
    }

    pub fn forgot_password(&self, email: &Email) -> Result<CodeDelivery> {
        self.entity
            .child("forgot-password")
            .post_json(&self.user(email))
            .map(|CodeDeliveryResponse { code_delivery_details }| code_delivery_details)
    }

    pub fn confirm_forgot_password(&self, email: &Email, code: &str, password: &str) -> Result<()> {
        self.entity
            .child("confirm-forgot-password")
            .post(&ConfirmForgotPasswordRequest {
                client_id: self.client_id.clone(),
                email: email.clone(),
                code: code.into(),
                password: password.into(),
            })
    }

    fn user(&self, email: &Email) -> UserRequest {
        UserRequest {
            client_id: self.client_id.clone(),
            email: email.clone(),
        }
    }
}
