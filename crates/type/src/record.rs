// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Name of the partition key attribute.
pub const KEY: &str = "id";

/// A record identifier, the sole partition key of the record table.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[repr(transparent)]
pub struct Id(String);

impl Id {
    /// Generates a fresh, random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Id {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(anyhow!("empty record id"))
        } else {
            Ok(Self(s.into()))
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single item of the record table.
///
/// Every attribute other than [`KEY`] is caller-supplied and kept verbatim.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Record {
    pub id: Id,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Builds a record keyed by `id` out of an input object, dropping any
    /// `id` attribute the input carries.
    pub fn project(id: Id, mut input: Map<String, Value>) -> Self {
        _ = input.remove(KEY);
        Self { id, fields: input }
    }
}

impl From<Record> for Value {
    fn from(Record { id, mut fields }: Record) -> Self {
        _ = fields.insert(KEY.into(), Value::String(id.0));
        Value::Object(fields)
    }
}
