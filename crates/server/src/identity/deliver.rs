// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

use gatehouse_type::identity::{CodeDelivery, DeliveryMedium};
use gatehouse_type::{Email, PhoneNumber};

use async_std::sync::Mutex;
use async_trait::async_trait;
use tracing::info;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Destination {
    Email(Email),
    Sms(PhoneNumber),
}

impl Destination {
    pub fn delivery(&self) -> CodeDelivery {
        match self {
            Destination::Email(email) => CodeDelivery {
                destination: email.masked(),
                medium: DeliveryMedium::Email,
            },
            Destination::Sms(phone) => CodeDelivery {
                destination: phone.masked(),
                medium: DeliveryMedium::Sms,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Purpose {
    Verification,
    Recovery,
}

/// A one-time code addressed to a user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub email: Email,
    pub destination: Destination,
    pub purpose: Purpose,
    pub code: String,
}

/// Sends one-time codes to users.
#[async_trait]
pub trait Deliver: Send + Sync + Debug {
    async fn deliver(&self, message: Message) -> anyhow::Result<()>;
}

/// Writes messages to the log instead of sending them.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

#[async_trait]
impl Deliver for Log {
    async fn deliver(&self, message: Message) -> anyhow::Result<()> {
        let (medium, to) = match &message.destination {
            Destination::Email(email) => ("email", email.to_string()),
            Destination::Sms(phone) => ("sms", phone.to_string()),
        };
        info!(
            target: "app::identity::deliver",
            medium,
            to = %to,
            purpose = ?message.purpose,
            "your code is {}",
            message.code
        );
        Ok(())
    }
}

/// Keeps delivered messages in memory.
#[derive(Debug, Default)]
pub struct Outbox(Mutex<Vec<Message>>);

impl Outbox {
    /// Removes and returns all delivered messages.
    pub async fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.0.lock().await)
    }

    /// Returns the most recent code sent for `email`.
    pub async fn last_code(&self, email: &Email) -> Option<String> {
        self.0
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| &m.email == email)
            .map(|m| m.code.clone())
    }
}

#[async_trait]
impl Deliver for Outbox {
    async fn deliver(&self, message: Message) -> anyhow::Result<()> {
        self.0.lock().await.push(message);
        Ok(())
    }
}
