// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// A user group name
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[repr(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// Name of the administrators group every pool declares.
    pub const ADMIN: &'static str = "Admin";

    pub fn admin() -> Self {
        Self(Self::ADMIN.into())
    }
}

impl FromStr for GroupName {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(anyhow!("empty group name"))
        } else if s.len() > 128 {
            Err(anyhow!("group name too long"))
        } else if s
            .find(|c| !matches!(c, '0'..='9' | 'a'..='z' | 'A'..='Z' | '-' | '_'))
            .is_some()
        {
            Err(anyhow!("invalid characters in group name"))
        } else {
            Ok(Self(s.into()))
        }
    }
}

impl<'de> Deserialize<'de> for GroupName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Display for GroupName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str() {
        assert!("".parse::<GroupName>().is_err());
        assert!("a b".parse::<GroupName>().is_err());
        assert!("a/b".parse::<GroupName>().is_err());

        assert_eq!("Admin".parse::<GroupName>().unwrap(), GroupName::admin());
        assert!("read_only-2".parse::<GroupName>().is_ok());
    }
}
