// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// Returns `n` random lowercase alphanumeric characters.
pub fn random_lowercase(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

fn valid_part(s: &str) -> bool {
    !s.is_empty()
        && s
            .find(|c| !matches!(c, '0'..='9' | 'a'..='z' | 'A'..='Z' | '-'))
            .is_none()
}

/// An identity pool identifier of the form `<region>_<suffix>`.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
#[repr(transparent)]
pub struct PoolId(String);

impl PoolId {
    pub fn generate(region: &str) -> Self {
        Self(format!("{region}_{}", random_lowercase(9)))
    }

    pub fn region(&self) -> &str {
        self.0.split_once('_').map(|(r, _)| r).unwrap_or_default()
    }
}

impl FromStr for PoolId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (region, suffix) = s
            .split_once('_')
            .ok_or_else(|| anyhow!("pool id must be of the form `<region>_<suffix>`"))?;
        if !valid_part(region) || !valid_part(suffix) {
            bail!("invalid characters in pool id")
        }
        Ok(Self(s.into()))
    }
}

impl<'de> Deserialize<'de> for PoolId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a client registered with an identity pool.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
#[repr(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self(random_lowercase(26))
    }
}

impl FromStr for ClientId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !valid_part(s) {
            bail!("invalid client id")
        }
        Ok(Self(s.into()))
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
