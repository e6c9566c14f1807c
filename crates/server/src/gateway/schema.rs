// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use super::RootType;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use anyhow::{anyhow, bail, Context};
use async_graphql::dynamic::{
    self, Enum, Field, FieldFuture, FieldValue, InputObject, Interface, InterfaceField, Object,
    ResolverContext, Scalar, Union,
};
use async_graphql::{Name, Value};
use async_graphql_parser::types::{
    BaseType, FieldDefinition, InputValueDefinition, SchemaDefinition, Type, TypeKind,
    TypeSystemDefinition,
};
use async_graphql_parser::{parse_schema, Positioned};

/// Schema served when none is configured.
pub const DEFAULT_SCHEMA: &str = include_str!("schema.graphql");

/// Scalars every GraphQL service knows.
const GRAPHQL_SCALARS: &[&str] = &["ID", "String", "Int", "Float", "Boolean"];

/// Scalars available to schemas without a declaration.
const AWS_SCALARS: &[&str] = &[
    "AWSDate",
    "AWSTime",
    "AWSDateTime",
    "AWSTimestamp",
    "AWSEmail",
    "AWSJSON",
    "AWSURL",
    "AWSPhone",
    "AWSIPAddress",
];

/// Key under which objects name their concrete type when returned through
/// an interface or union.
const TYPENAME: &str = "__typename";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Base {
    Named(String),
    List(Box<TypeRef>),
}

/// A reference to a type, as written in a field or argument declaration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeRef {
    pub base: Base,
    pub nullable: bool,
}

impl TypeRef {
    /// Name of the innermost named type.
    pub fn name(&self) -> &str {
        match &self.base {
            Base::Named(name) => name,
            Base::List(inner) => inner.name(),
        }
    }
}

impl From<&Type> for TypeRef {
    fn from(ty: &Type) -> Self {
        Self {
            base: match &ty.base {
                BaseType::Named(name) => Base::Named(name.to_string()),
                BaseType::List(inner) => Base::List(Box::new(inner.as_ref().into())),
            },
            nullable: ty.nullable,
        }
    }
}

impl From<&TypeRef> for dynamic::TypeRef {
    fn from(ty: &TypeRef) -> Self {
        let base = match &ty.base {
            Base::Named(name) => dynamic::TypeRef::named(name.as_str()),
            Base::List(inner) => dynamic::TypeRef::List(Box::new(inner.as_ref().into())),
        };
        if ty.nullable {
            base
        } else {
            dynamic::TypeRef::NonNull(Box::new(base))
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            Base::Named(name) => write!(f, "{name}")?,
            Base::List(inner) => write!(f, "[{inner}]")?,
        }
        if !self.nullable {
            write!(f, "!")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputValue {
    pub ty: TypeRef,
    pub default: Option<Value>,
}

impl InputValue {
    fn build(&self, name: &str) -> dynamic::InputValue {
        let input = dynamic::InputValue::new(name, &self.ty);
        match &self.default {
            Some(default) => input.default_value(default.clone()),
            None => input,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub args: BTreeMap<String, InputValue>,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeDef {
    Scalar,
    Enum(BTreeSet<String>),
    Object {
        fields: BTreeMap<String, FieldDef>,
        implements: BTreeSet<String>,
    },
    Interface(BTreeMap<String, FieldDef>),
    Union(BTreeSet<String>),
    Input(BTreeMap<String, InputValue>),
}

impl TypeDef {
    pub fn is_input(&self) -> bool {
        matches!(self, TypeDef::Scalar | TypeDef::Enum(_) | TypeDef::Input(_))
    }

    pub fn is_output(&self) -> bool {
        !matches!(self, TypeDef::Input(_))
    }

    /// Whether values of this type must name their concrete object type.
    fn is_abstract(&self) -> bool {
        matches!(self, TypeDef::Interface(_) | TypeDef::Union(_))
    }
}

fn input_values(values: &[Positioned<InputValueDefinition>]) -> BTreeMap<String, InputValue> {
    values
        .iter()
        .map(|Positioned { node, .. }| {
            (
                node.name.node.to_string(),
                InputValue {
                    ty: (&node.ty.node).into(),
                    default: node.default_value.as_ref().map(|v| v.node.clone()),
                },
            )
        })
        .collect()
}

fn field_defs(fields: &[Positioned<FieldDefinition>]) -> BTreeMap<String, FieldDef> {
    fields
        .iter()
        .map(|Positioned { node, .. }| {
            (
                node.name.node.to_string(),
                FieldDef {
                    args: input_values(&node.arguments),
                    ty: (&node.ty.node).into(),
                },
            )
        })
        .collect()
}

fn name_set(names: &[Positioned<Name>]) -> BTreeSet<String> {
    names.iter().map(|name| name.node.to_string()).collect()
}

/// Resolves a field of a non-root object from the JSON value of its parent.
fn from_parent(ctx: ResolverContext<'_>, abstract_type: bool) -> FieldFuture<'_> {
    let name = ctx.item.node.name.node.as_str();
    let value = match ctx.parent_value.as_value() {
        Some(Value::Object(parent)) => parent.get(name).cloned(),
        _ => None,
    };
    match value {
        Some(Value::Null) | None => FieldFuture::Value(None),
        Some(value) if abstract_type => FieldFuture::Value(Some(typed(value))),
        value => FieldFuture::from_value(value),
    }
}

/// Wraps an interface or union value, and each item of a list of them, with
/// the concrete type it names under `__typename`.
pub fn typed(value: Value) -> FieldValue<'static> {
    match value {
        Value::List(items) => FieldValue::list(items.into_iter().map(typed)),
        Value::Object(obj) => {
            let ty = match obj.get(TYPENAME) {
                Some(Value::String(ty)) => Some(ty.clone()),
                _ => None,
            };
            let value = FieldValue::value(Value::Object(obj));
            match ty {
                Some(ty) => value.with_type(ty),
                None => value,
            }
        }
        value => FieldValue::value(value),
    }
}

/// The type system the gateway validates requests against.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    query: String,
    mutation: Option<String>,
    types: HashMap<String, TypeDef>,
}

impl Schema {
    /// Parses an SDL document.
    pub fn parse(sdl: &str) -> anyhow::Result<Self> {
        let doc = parse_schema(sdl).context("failed to parse schema")?;

        let mut types: HashMap<String, TypeDef> = GRAPHQL_SCALARS
            .iter()
            .chain(AWS_SCALARS)
            .map(|name| (name.to_string(), TypeDef::Scalar))
            .collect();
        let mut roots: Option<SchemaDefinition> = None;
        for def in doc.definitions {
            let def = match def {
                TypeSystemDefinition::Schema(Positioned { node, .. }) => {
                    if roots.is_some() && !node.extend {
                        bail!("schema must contain at most one schema definition")
                    }
                    match roots.as_mut() {
                        Some(roots) => {
                            roots.query = node.query.or_else(|| roots.query.take());
                            roots.mutation = node.mutation.or_else(|| roots.mutation.take());
                        }
                        None => roots = Some(node),
                    }
                    continue;
                }
                TypeSystemDefinition::Directive(_) => continue,
                TypeSystemDefinition::Type(Positioned { node, .. }) => node,
            };

            let name = def.name.node.to_string();
            let new = match &def.kind {
                TypeKind::Scalar => TypeDef::Scalar,
                TypeKind::Enum(e) => {
                    TypeDef::Enum(e.values.iter().map(|v| v.node.value.node.to_string()).collect())
                }
                TypeKind::Object(o) => TypeDef::Object {
                    fields: field_defs(&o.fields),
                    implements: name_set(&o.implements),
                },
                TypeKind::Interface(i) => TypeDef::Interface(field_defs(&i.fields)),
                TypeKind::Union(u) => TypeDef::Union(name_set(&u.members)),
                TypeKind::InputObject(i) => TypeDef::Input(input_values(&i.fields)),
            };

            match types.get_mut(&name) {
                None => {
                    _ = types.insert(name, new);
                }
                Some(existing) => match (existing, new) {
                    (
                        TypeDef::Object { fields, implements },
                        TypeDef::Object {
                            fields: more,
                            implements: also,
                        },
                    ) if def.extend => {
                        fields.extend(more);
                        implements.extend(also);
                    }
                    (TypeDef::Interface(fields), TypeDef::Interface(more)) if def.extend => {
                        fields.extend(more)
                    }
                    (TypeDef::Union(members), TypeDef::Union(more)) if def.extend => {
                        members.extend(more)
                    }
                    (TypeDef::Input(fields), TypeDef::Input(more)) if def.extend => {
                        fields.extend(more)
                    }
                    (TypeDef::Enum(values), TypeDef::Enum(more)) if def.extend => {
                        values.extend(more)
                    }
                    _ => bail!("type `{name}` is defined more than once"),
                },
            }
        }

        let (query, mutation) = match roots {
            Some(SchemaDefinition {
                query, mutation, ..
            }) => (
                query
                    .map(|name| name.node.to_string())
                    .ok_or_else(|| anyhow!("schema definition lacks a query root"))?,
                mutation.map(|name| name.node.to_string()),
            ),
            None => (
                "Query".into(),
                types.contains_key("Mutation").then(|| "Mutation".into()),
            ),
        };

        let schema = Self {
            query,
            mutation,
            types,
        };
        schema.check()?;
        Ok(schema)
    }

    fn check_fields(&self, name: &str, fields: &BTreeMap<String, FieldDef>) -> anyhow::Result<()> {
        for (field, def) in fields {
            if !self.types.get(def.ty.name()).map_or(false, TypeDef::is_output) {
                bail!("`{name}.{field}` must be of a defined output type, not `{}`", def.ty.name())
            }
            for (arg, input) in &def.args {
                if !self.is_input_type(input.ty.name()) {
                    bail!("argument `{name}.{field}({arg})` must be of an input type")
                }
            }
        }
        Ok(())
    }

    fn check(&self) -> anyhow::Result<()> {
        for root in std::iter::once(&self.query).chain(self.mutation.as_ref()) {
            match self.types.get(root) {
                Some(TypeDef::Object { .. }) => {}
                _ => bail!("root type `{root}` must be a defined object type"),
            }
        }
        for (name, def) in &self.types {
            match def {
                TypeDef::Object { fields, implements } => {
                    self.check_fields(name, fields)?;
                    for interface in implements {
                        if !matches!(self.types.get(interface), Some(TypeDef::Interface(_))) {
                            bail!("`{name}` implements `{interface}`, which is not an interface")
                        }
                    }
                }
                TypeDef::Interface(fields) => self.check_fields(name, fields)?,
                TypeDef::Union(members) => {
                    for member in members {
                        if !matches!(self.types.get(member), Some(TypeDef::Object { .. })) {
                            bail!("union `{name}` member `{member}` must be an object type")
                        }
                    }
                }
                TypeDef::Input(fields) => {
                    for (field, input) in fields {
                        if !self.is_input_type(input.ty.name()) {
                            bail!("`{name}.{field}` must be of an input type")
                        }
                    }
                }
                TypeDef::Scalar | TypeDef::Enum(_) => {}
            }
        }
        Ok(())
    }

    fn is_input_type(&self, name: &str) -> bool {
        self.types.get(name).map_or(false, TypeDef::is_input)
    }

    fn is_abstract_type(&self, name: &str) -> bool {
        self.types.get(name).map_or(false, TypeDef::is_abstract)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mutation(&self) -> Option<&str> {
        self.mutation.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Returns the fields of object or interface type `name`.
    pub fn fields(&self, name: &str) -> Option<&BTreeMap<String, FieldDef>> {
        match self.types.get(name) {
            Some(TypeDef::Object { fields, .. } | TypeDef::Interface(fields)) => Some(fields),
            _ => None,
        }
    }

    fn root(&self, name: &str) -> Option<RootType> {
        if name == self.query {
            Some(RootType::Query)
        } else if Some(name) == self.mutation.as_deref() {
            Some(RootType::Mutation)
        } else {
            None
        }
    }

    /// Builds the executable schema. `root_field` makes the field, resolver
    /// included, for every field of a root type; it is told whether the field
    /// is of an interface or union type, in which case resolved values must
    /// go through [typed]. Fields of other objects resolve from the JSON value
    /// of their parent.
    pub fn executable(
        &self,
        mut root_field: impl FnMut(RootType, &str, dynamic::TypeRef, bool) -> Field,
    ) -> anyhow::Result<dynamic::Schema> {
        let mut builder = dynamic::Schema::build(&self.query, self.mutation.as_deref(), None);
        let mut names: Vec<_> = self.types.keys().collect();
        names.sort();
        for name in names {
            builder = match &self.types[name] {
                TypeDef::Scalar if GRAPHQL_SCALARS.contains(&name.as_str()) => continue,
                TypeDef::Scalar => builder.register(Scalar::new(name)),
                TypeDef::Enum(values) => builder.register(Enum::new(name).items(values)),
                TypeDef::Object { fields, implements } => {
                    let mut object = implements
                        .iter()
                        .fold(Object::new(name), |object, interface| object.implement(interface));
                    for (field, def) in fields {
                        let ty = dynamic::TypeRef::from(&def.ty);
                        let abstract_type = self.is_abstract_type(def.ty.name());
                        let mut built = match self.root(name) {
                            Some(root) => root_field(root, field, ty, abstract_type),
                            None => {
                                Field::new(field, ty, move |ctx| from_parent(ctx, abstract_type))
                            }
                        };
                        for (arg, input) in &def.args {
                            built = built.argument(input.build(arg));
                        }
                        object = object.field(built);
                    }
                    builder.register(object)
                }
                TypeDef::Interface(fields) => {
                    let mut interface = Interface::new(name);
                    for (field, def) in fields {
                        let mut built = InterfaceField::new(field, &def.ty);
                        for (arg, input) in &def.args {
                            built = built.argument(input.build(arg));
                        }
                        interface = interface.field(built);
                    }
                    builder.register(interface)
                }
                TypeDef::Union(members) => builder.register(
                    members
                        .iter()
                        .fold(Union::new(name), |union, member| union.possible_type(member)),
                ),
                TypeDef::Input(fields) => {
                    let mut input = InputObject::new(name);
                    for (field, def) in fields {
                        input = input.field(def.build(field));
                    }
                    builder.register(input)
                }
            };
        }
        builder
            .finish()
            .map_err(|e| anyhow!("failed to build executable schema: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn default_schema() {
        let schema = Schema::parse(DEFAULT_SCHEMA).unwrap();
        assert_eq!(schema.query(), "Query");
        assert_eq!(schema.mutation(), Some("Mutation"));

        let query = schema.fields("Query").unwrap();
        assert_eq!(
            query.keys().collect::<Vec<_>>(),
            vec!["getTodo", "listTodos"]
        );
        assert_eq!(query["getTodo"].args["id"].ty.to_string(), "ID!");
        assert_eq!(query["listTodos"].ty.to_string(), "[Todo]");

        let mutation = schema.fields("Mutation").unwrap();
        assert_eq!(
            mutation.keys().collect::<Vec<_>>(),
            vec!["addTodo", "deleteTodo", "updateTodo"]
        );
        assert_eq!(
            mutation["updateTodo"].args["input"].ty.to_string(),
            "UpdateTodoInput!"
        );
        assert!(matches!(schema.get("TodoInput"), Some(TypeDef::Input(_))));
        assert!(matches!(schema.get("Todo"), Some(TypeDef::Object { .. })));
        assert!(matches!(schema.get("AWSDateTime"), Some(TypeDef::Scalar)));
    }

    #[test]
    fn roots_and_extensions() {
        let schema = Schema::parse(
            r#"
            schema { query: Root }
            type Root { a: Int }
            extend type Root { b(n: Int = 3): String }
            enum Color { RED }
            extend enum Color { GREEN }
            "#,
        )
        .unwrap();
        assert_eq!(schema.query(), "Root");
        assert_eq!(schema.mutation(), None);
        let root = schema.fields("Root").unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(root["b"].args["n"].default, Some(Value::from(3)));
        assert_eq!(
            schema.get("Color"),
            Some(&TypeDef::Enum(BTreeSet::from([
                "GREEN".to_string(),
                "RED".to_string()
            ])))
        );
    }

    #[test]
    fn rejects_broken_schemas() {
        assert!(Schema::parse("type Query {").is_err());
        assert!(Schema::parse("type Mutation { a: Int }").is_err());
        assert!(Schema::parse("type Query { a: Missing }").is_err());
        assert!(Schema::parse("type Query { a: Int } type Query { b: Int }").is_err());
        assert!(Schema::parse("type T { a: Int } type Query { a(t: T): Int }").is_err());
        assert!(Schema::parse("schema { query: Q } type Query { a: Int }").is_err());
        assert!(Schema::parse("input I { a: Int } type Query { a: I }").is_err());
        assert!(Schema::parse("type Query { a: Int } union U = Int").is_err());
        assert!(Schema::parse("type Query { a: Int } type T implements Query { a: Int }").is_err());
    }

    #[test]
    fn abstract_types() {
        let schema = Schema::parse(
            r#"
            interface Named { name: String }
            type Pet implements Named { name: String }
            type Query { pet: Pet }
            union Any = Pet
            extend union Any = Query
            "#,
        )
        .unwrap();
        assert_eq!(
            schema.get("Pet"),
            Some(&TypeDef::Object {
                fields: schema.fields("Named").unwrap().clone(),
                implements: BTreeSet::from(["Named".to_string()]),
            })
        );
        assert_eq!(
            schema.get("Any"),
            Some(&TypeDef::Union(BTreeSet::from([
                "Pet".to_string(),
                "Query".to_string()
            ])))
        );
    }

    #[async_std::test]
    async fn executable() {
        let schema = Schema::parse(
            r#"
            interface Named { name: String }
            type Person implements Named { name: String friends: [Person] }
            type Pet implements Named { name: String legs: Int! }
            union Any = Person | Pet
            enum Mood { HAPPY SAD }
            type Query { me(mood: Mood = HAPPY): Person named: [Named] any: Any at: AWSDateTime }
            "#,
        )
        .unwrap();
        let executable = schema
            .executable(|root, name, ty, abstract_type| {
                assert_eq!(root, RootType::Query);
                assert_eq!(abstract_type, name == "named" || name == "any");
                let value = match name {
                    "me" => json!({ "name": "ann", "friends": [{ "name": "bob" }] }),
                    "named" => json!([
                        { "__typename": "Person", "name": "ann" },
                        { "__typename": "Pet", "name": "rex", "legs": 4 },
                    ]),
                    "any" => json!({ "__typename": "Pet", "name": "rex", "legs": 4 }),
                    _ => json!("2024-01-01T00:00:00Z"),
                };
                let value = Value::from_json(value).unwrap();
                let mood = (name == "me").then_some("HAPPY");
                Field::new(name, ty, move |ctx| {
                    let given = ctx.args.get("mood").map(|v| v.enum_name().unwrap().to_string());
                    assert_eq!(given.as_deref(), mood);
                    let value = value.clone();
                    FieldFuture::Value(Some(if abstract_type {
                        typed(value)
                    } else {
                        FieldValue::value(value)
                    }))
                })
            })
            .unwrap();

        let res = executable
            .execute(
                r#"{
                  me { name friends { name } }
                  named { __typename name ... on Pet { legs } }
                  any { ... on Pet { legs } }
                  at
                }"#,
            )
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data.into_json().unwrap(),
            json!({
                "me": { "name": "ann", "friends": [{ "name": "bob" }] },
                "named": [
                    { "__typename": "Person", "name": "ann" },
                    { "__typename": "Pet", "name": "rex", "legs": 4 },
                ],
                "any": { "legs": 4 },
                "at": "2024-01-01T00:00:00Z",
            })
        );
    }
}
