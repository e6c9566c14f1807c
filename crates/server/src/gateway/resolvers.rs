// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

//! Per-field transforms between GraphQL arguments and record table actions.

use std::collections::HashMap;
use std::fmt;

use gatehouse_type::record::KEY;
use gatehouse_type::{Record, RecordId};

use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RootType {
    Query,
    Mutation,
}

impl fmt::Display for RootType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootType::Query => write!(f, "Query"),
            RootType::Mutation => write!(f, "Mutation"),
        }
    }
}

/// A single record table operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Get(RecordId),
    Put(Record),
    Delete(RecordId),
    Scan,
}

/// Result of an [Action].
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Item(Option<Record>),
    Items(Vec<Record>),
}

type Arguments = Map<String, Value>;

/// Request and response transform bound to one schema field.
#[derive(Clone, Copy, Debug)]
pub struct Resolver {
    pub request: fn(&Arguments) -> Result<Action, String>,
    pub response: fn(Outcome) -> Value,
}

pub type Resolvers = HashMap<(RootType, String), Resolver>;

fn key(value: Option<&Value>) -> Result<RecordId, String> {
    let id = match value {
        Some(Value::String(id)) => id.clone(),
        // `ID` arguments may be given as integers.
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err("The provided key element does not match the schema".into()),
    };
    id.parse()
        .map_err(|e| format!("One or more parameter values were invalid: {e}"))
}

fn input(args: &Arguments) -> Result<Map<String, Value>, String> {
    match args.get("input") {
        Some(Value::Object(input)) => Ok(input.clone()),
        _ => Err("Expected argument `input` to be an object".into()),
    }
}

fn get_item(args: &Arguments) -> Result<Action, String> {
    key(args.get(KEY)).map(Action::Get)
}

fn scan(_: &Arguments) -> Result<Action, String> {
    Ok(Action::Scan)
}

fn put_new(args: &Arguments) -> Result<Action, String> {
    input(args).map(|input| Action::Put(Record::project(RecordId::generate(), input)))
}

fn put_keyed(args: &Arguments) -> Result<Action, String> {
    let input = input(args)?;
    let id = key(input.get(KEY))?;
    Ok(Action::Put(Record::project(id, input)))
}

fn delete_item(args: &Arguments) -> Result<Action, String> {
    key(args.get(KEY)).map(Action::Delete)
}

fn item(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Item(Some(record)) => record.into(),
        Outcome::Item(None) => Value::Null,
        Outcome::Items(records) => Value::Array(records.into_iter().map(Value::from).collect()),
    }
}

/// The Todo resolvers.
pub fn todos() -> Resolvers {
    let get = Resolver {
        request: get_item,
        response: item,
    };
    let list = Resolver {
        request: scan,
        response: item,
    };
    let add = Resolver {
        request: put_new,
        response: item,
    };
    let update = Resolver {
        request: put_keyed,
        response: item,
    };
    let delete = Resolver {
        request: delete_item,
        response: item,
    };
    [
        ((RootType::Query, "getTodo"), get),
        ((RootType::Query, "listTodos"), list),
        ((RootType::Mutation, "addTodo"), add),
        ((RootType::Mutation, "updateTodo"), update),
        ((RootType::Mutation, "deleteTodo"), delete),
    ]
    .into_iter()
    .map(|((root, name), resolver)| ((root, name.to_string()), resolver))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn args(v: Value) -> Arguments {
        v.as_object().cloned().unwrap()
    }

    fn resolver(root: RootType, name: &str) -> Resolver {
        todos()[&(root, name.to_string())]
    }

    #[test]
    fn requests() {
        assert_eq!(
            (resolver(RootType::Query, "getTodo").request)(&args(json!({"id": "1"}))),
            Ok(Action::Get("1".parse().unwrap()))
        );
        assert!((resolver(RootType::Query, "getTodo").request)(&args(json!({"id": ""}))).is_err());
        assert_eq!(
            (resolver(RootType::Query, "getTodo").request)(&args(json!({"id": 7}))),
            Ok(Action::Get("7".parse().unwrap()))
        );
        assert!((resolver(RootType::Query, "getTodo").request)(&args(json!({"id": true}))).is_err());
        assert_eq!(
            (resolver(RootType::Query, "listTodos").request)(&Map::new()),
            Ok(Action::Scan)
        );
        assert_eq!(
            (resolver(RootType::Mutation, "deleteTodo").request)(&args(json!({"id": "1"}))),
            Ok(Action::Delete("1".parse().unwrap()))
        );

        let update = (resolver(RootType::Mutation, "updateTodo").request)(&args(
            json!({"input": {"id": "7", "name": "eggs"}}),
        ));
        assert_eq!(
            update,
            Ok(Action::Put(Record {
                id: "7".parse().unwrap(),
                fields: args(json!({"name": "eggs"})),
            }))
        );
        assert!((resolver(RootType::Mutation, "updateTodo").request)(&args(
            json!({"input": {"name": "eggs"}})
        ))
        .is_err());
    }

    #[test]
    fn add_generates_ids() {
        let add = resolver(RootType::Mutation, "addTodo");
        let input = args(json!({"input": {"name": "milk", "completed": false}}));
        let (a, b) = match ((add.request)(&input), (add.request)(&input)) {
            (Ok(Action::Put(a)), Ok(Action::Put(b))) => (a, b),
            other => panic!("unexpected {other:?}"),
        };
        assert_ne!(a.id, b.id);
        assert_eq!(a.fields, args(json!({"name": "milk", "completed": false})));
    }

    #[test]
    fn responses() {
        let record = Record {
            id: "1".parse().unwrap(),
            fields: args(json!({"name": "milk"})),
        };
        let item = resolver(RootType::Query, "getTodo").response;
        assert_eq!(item(Outcome::Item(None)), Value::Null);
        assert_eq!(
            item(Outcome::Item(Some(record.clone()))),
            json!({"id": "1", "name": "milk"})
        );
        let list = resolver(RootType::Query, "listTodos").response;
        assert_eq!(list(Outcome::Items(vec![])), json!([]));
        assert_eq!(
            list(Outcome::Items(vec![record])),
            json!([{"id": "1", "name": "milk"}])
        );
    }
}
