// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use super::{Auth, Client, Entity, Result};

use std::fmt;

use gatehouse_type::graphql::{Error, Request};
use gatehouse_type::RecordId;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const TODO_FIELDS: &str = "id name description completed";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub id: RecordId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Fields of a Todo to write. Absent fields are not stored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct TodoInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Errors carried by an otherwise successful GraphQL response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Errors(pub Vec<Error>);

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

/// Typed access to the Todo resolvers.
#[derive(Clone, Debug)]
pub struct Todos<'a> {
    entity: Entity<'a>,
    auth: &'a Auth,
}

impl<'a> Todos<'a> {
    pub fn new(client: &'a Client, auth: &'a Auth) -> Self {
        Self {
            entity: Entity::new(client, "graphql"),
            auth,
        }
    }

    fn field<T: DeserializeOwned>(&self, field: &str, query: String, variables: Value) -> Result<T> {
        let mut res = self
            .entity
            .graphql(self.auth, &Request::new(query).variables(variables))?;
        if !res.errors.is_empty() {
            return Err(Errors(res.errors).into());
        }
        let value = res
            .data
            .as_mut()
            .and_then(|data| data.remove(field))
            .ok_or_else(|| anyhow!("response is missing field `{field}`"))?;
        serde_json::from_value(value).with_context(|| format!("failed to decode `{field}`"))
    }

    pub fn get(&self, id: &RecordId) -> Result<Option<Todo>> {
        self.field(
            "getTodo",
            format!("query($id: ID!) {{ getTodo(id: $id) {{ {TODO_FIELDS} }} }}"),
            json!({ "id": id }),
        )
    }

    pub fn list(&self) -> Result<Vec<Todo>> {
        self.field::<Option<Vec<Option<Todo>>>>(
            "listTodos",
            format!("{{ listTodos {{ {TODO_FIELDS} }} }}"),
            Value::Null,
        )
        .map(|todos| todos.into_iter().flatten().flatten().collect())
    }

    pub fn add(&self, input: &TodoInput) -> Result<Todo> {
        self.field::<Option<Todo>>(
            "addTodo",
            format!("mutation($input: TodoInput!) {{ addTodo(input: $input) {{ {TODO_FIELDS} }} }}"),
            json!({ "input": input }),
        )?
        .ok_or_else(|| anyhow!("no Todo was added"))
    }

    /// Writes `input` under `id`, creating the Todo if it does not exist.
    pub fn update(&self, id: &RecordId, input: &TodoInput) -> Result<Todo> {
        let mut input = serde_json::to_value(input).context("failed to encode input")?;
        if let Value::Object(input) = &mut input {
            _ = input.insert("id".into(), json!(id));
        }
        self.field::<Option<Todo>>(
            "updateTodo",
            format!(
                "mutation($input: UpdateTodoInput!) {{ updateTodo(input: $input) {{ {TODO_FIELDS} }} }}"
            ),
            json!({ "input": input }),
        )?
        .ok_or_else(|| anyhow!("no Todo was updated"))
    }

    pub fn delete(&self, id: &RecordId) -> Result<Option<Todo>> {
        self.field(
            "deleteTodo",
            format!("mutation($id: ID!) {{ deleteTodo(id: $id) {{ {TODO_FIELDS} }} }}"),
            json!({ "id": id }),
        )
    }
}
