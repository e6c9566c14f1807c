// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// A phone number in E.164 format.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
#[repr(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number with all but the last four digits hidden.
    pub fn masked(&self) -> String {
        let digits = self.0.len() - 1;
        let shown = &self.0[self.0.len() - 4..];
        format!("+{}{shown}", "*".repeat(digits - 4))
    }
}

impl FromStr for PhoneNumber {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('+')
            .ok_or_else(|| anyhow!("phone number must start with `+`"))?;
        if !(8..=15).contains(&digits.len()) {
            Err(anyhow!("phone number must have between 8 and 15 digits"))
        } else if !digits.bytes().all(|b| b.is_ascii_digit()) {
            Err(anyhow!("invalid characters in phone number"))
        } else {
            Ok(Self(s.into()))
        }
    }
}

impl<'de> Deserialize<'de> for PhoneNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
