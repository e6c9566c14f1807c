// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

#![warn(rust_2018_idioms, unused_lifetimes, unused_qualifications, clippy::all)]
#![deny(unsafe_code)]

pub mod api_key;
pub mod graphql;
pub mod identity;
pub mod record;

mod outputs;
mod time;

pub use api_key::ApiKey;
pub use identity::{
    Claims, ClientId, Email, GroupName, PhoneNumber, PoolId, TokenUse, Tokens, UserStatus,
};
pub use outputs::*;
pub use record::{Id as RecordId, Record};
pub use time::*;
