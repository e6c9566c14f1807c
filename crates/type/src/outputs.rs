// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use crate::{ClientId, PoolId};

use serde::{Deserialize, Serialize};
use url::Url;

/// Facts about a provisioned deployment, exposed to operators and
/// downstream consumers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outputs {
    pub user_pool_id: PoolId,
    pub user_pool_client_id: ClientId,
    pub graphql_url: Url,
    pub api_key: String,
    pub api_id: String,
}
