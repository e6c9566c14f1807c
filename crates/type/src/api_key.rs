// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use crate::identity::random_lowercase;
use crate::DAY;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// A static API key accepted by the gateway for callers without an identity.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ApiKey {
    pub id: String,

    pub value: String,

    /// Unix time the key was provisioned at
    pub created: u64,

    /// Unix time the key stops being accepted at
    pub expires: u64,
}

impl ApiKey {
    /// Length of the validity window of a freshly provisioned key.
    pub const VALIDITY: u64 = 30 * DAY;

    /// Provisions a new key valid for [`ApiKey::VALIDITY`] starting at `now`.
    pub fn provision(now: u64) -> Self {
        Self {
            id: random_lowercase(26),
            value: format!("da2-{}", random_lowercase(26)),
            created: now,
            expires: now.saturating_add(Self::VALIDITY),
        }
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        (self.created..self.expires).contains(&now)
    }

    /// Returns whether `presented` is this key and the key is valid at `now`.
    pub fn accepts(&self, presented: &str, now: u64) -> bool {
        let matches: bool = self.value.as_bytes().ct_eq(presented.as_bytes()).into();
        matches && self.is_valid_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_window() {
        let key = ApiKey::provision(1_000);
        assert!(key.value.starts_with("da2-"));
        assert_eq!(key.expires - key.created, 30 * DAY);

        assert!(!key.is_valid_at(999));
        assert!(key.is_valid_at(1_000));
        assert!(key.is_valid_at(1_000 + 30 * DAY - 1));
        assert!(!key.is_valid_at(1_000 + 30 * DAY));
    }

    #[test]
    fn accepts() {
        let key = ApiKey::provision(1_000);
        assert!(key.accepts(&key.value, 2_000));
        assert!(!key.accepts("da2-wrong", 2_000));
        assert!(!key.accepts("", 2_000));
        assert!(!key.accepts(&key.value[..key.value.len() - 1], 2_000));
        assert!(!key.accepts(&format!("{}x", key.value), 2_000));
        assert!(!key.accepts(&key.value, 1_000 + 31 * DAY));
    }
}
