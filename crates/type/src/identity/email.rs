// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// An email address, normalized to lower case.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[repr(transparent)]
pub struct Email(String);

impl Email {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the address with most characters hidden, e.g. `j***@e***.com`.
    pub fn masked(&self) -> String {
        let (local, domain) = self.0.split_once('@').unwrap_or((&self.0, ""));
        let (host, tld) = domain.rsplit_once('.').unwrap_or((domain, ""));
        let first = |s: &str| s.chars().next().map(String::from).unwrap_or_default();
        format!("{}***@{}***.{tld}", first(local), first(host))
    }
}

impl FromStr for Email {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            bail!("empty email address")
        }
        if s.len() > 254 {
            bail!("email address too long")
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            bail!("invalid characters in email address")
        }
        let (local, domain) = s
            .split_once('@')
            .ok_or_else(|| anyhow!("email address must contain `@`"))?;
        if local.is_empty() || domain.contains('@') {
            bail!("invalid email address local part")
        }
        match domain.rsplit_once('.') {
            Some((host, tld)) if !host.is_empty() && !tld.is_empty() => {}
            _ => bail!("invalid email address domain"),
        }
        if domain.split('.').any(str::is_empty) {
            bail!("invalid email address domain")
        }
        Ok(Self(s.to_lowercase()))
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
