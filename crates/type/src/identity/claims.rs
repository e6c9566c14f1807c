// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use super::{ClientId, Email, GroupName};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Id,
    Access,
}

/// Claims carried by a bearer token issued by the identity pool.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Claims {
    /// Immutable user identifier
    pub sub: String,

    pub email: Email,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupName>,

    pub client_id: ClientId,

    pub token_use: TokenUse,

    pub iss: String,

    pub iat: u64,

    pub exp: u64,
}

impl Claims {
    pub fn in_group(&self, group: &GroupName) -> bool {
        self.groups.contains(group)
    }
}
