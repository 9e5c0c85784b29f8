//! Declarative field schemas.
//!
//! A [`Schema`] maps field names to either a primitive leaf kind or a nested
//! schema. Schemas are immutable once handed to a
//! [`PersistentObject`](crate::PersistentObject).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::accessor::AccessorTable;
use crate::error::{SchemaError, SchemaResult};
use crate::value::FieldKind;

/// One field declaration: a primitive leaf or a nested schema.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaNode {
    Leaf(FieldKind),
    Composite(Schema),
}

impl SchemaNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }
}

/// A node of the schema tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    fields: BTreeMap<String, SchemaNode>,
}

impl Schema {
    /// An empty schema. Add fields with the builder methods.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(self, name: impl Into<String>) -> Self {
        self.leaf(name, FieldKind::Number)
    }

    pub fn string(self, name: impl Into<String>) -> Self {
        self.leaf(name, FieldKind::String)
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.leaf(name, FieldKind::Boolean)
    }

    /// Declare a leaf field. Redeclaring a name replaces the earlier entry.
    pub fn leaf(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), SchemaNode::Leaf(kind));
        self
    }

    /// Declare a nested schema field.
    pub fn nested(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.fields.insert(name.into(), SchemaNode::Composite(schema));
        self
    }

    /// Parse a schema description such as
    /// `{"a": "number", "b": {"c": "boolean"}}`.
    pub fn from_json(description: &Value) -> SchemaResult<Self> {
        Self::from_json_at(description, &[])
    }

    fn from_json_at(description: &Value, path: &[String]) -> SchemaResult<Self> {
        let map = description
            .as_object()
            .ok_or_else(|| SchemaError::InvalidDescription {
                path: display_path(path),
                reason: "expected an object of field declarations".into(),
            })?;

        let mut schema = Self::new();
        for (name, decl) in map {
            let node = match decl {
                Value::String(kind) => {
                    let kind =
                        FieldKind::parse(kind).ok_or_else(|| SchemaError::InvalidDescription {
                            path: display_path(path),
                            reason: format!("unknown kind {kind:?} for field {name}"),
                        })?;
                    SchemaNode::Leaf(kind)
                }
                Value::Object(_) => {
                    let mut child_path = path.to_vec();
                    child_path.push(name.clone());
                    SchemaNode::Composite(Self::from_json_at(decl, &child_path)?)
                }
                other => {
                    return Err(SchemaError::InvalidDescription {
                        path: display_path(path),
                        reason: format!("field {name} declared as {other}"),
                    })
                }
            };
            schema.fields.insert(name.clone(), node);
        }
        schema.validate()?;
        Ok(schema)
    }

    pub fn field(&self, name: &str) -> Option<&SchemaNode> {
        self.fields.get(name)
    }

    /// All fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Leaf fields of this node only.
    pub fn leaves(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().filter_map(|(k, v)| match v {
            SchemaNode::Leaf(kind) => Some((k.as_str(), *kind)),
            SchemaNode::Composite(_) => None,
        })
    }

    /// Nested schemas of this node only.
    pub fn composites(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.fields.iter().filter_map(|(k, v)| match v {
            SchemaNode::Composite(s) => Some((k.as_str(), s)),
            SchemaNode::Leaf(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every node of the tree: names must be non-empty and member
    /// names must be unique within a node.
    pub fn validate(&self) -> SchemaResult<()> {
        self.validate_at(&[])
    }

    fn validate_at(&self, path: &[String]) -> SchemaResult<()> {
        AccessorTable::build(self, path)?;
        for (name, child) in self.composites() {
            let mut child_path = path.to_vec();
            child_path.push(name.to_string());
            child.validate_at(&child_path)?;
        }
        Ok(())
    }
}

/// Render a field path for messages and logs.
pub(crate) fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_declares_fields() {
        let schema = Schema::new()
            .number("a")
            .string("b")
            .nested("c", Schema::new().boolean("d"));

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.field("a"), Some(&SchemaNode::Leaf(FieldKind::Number)));
        assert_eq!(schema.leaves().count(), 2);
        assert_eq!(schema.composites().map(|(n, _)| n).collect::<Vec<_>>(), vec!["c"]);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn parse_description() {
        let schema = Schema::from_json(&json!({
            "id": "number",
            "profile": { "username": "string", "contacts": { "phone": "string" } }
        }))
        .unwrap();

        let expected = Schema::new().number("id").nested(
            "profile",
            Schema::new()
                .string("username")
                .nested("contacts", Schema::new().string("phone")),
        );
        assert_eq!(schema, expected);
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        let err = Schema::from_json(&json!({ "b": { "c": "date" } })).unwrap_err();
        match err {
            SchemaError::InvalidDescription { path, .. } => assert_eq!(path, "b"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_non_object() {
        assert!(Schema::from_json(&json!(["a"])).is_err());
        assert!(Schema::from_json(&json!({ "a": 1 })).is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Schema::new().number("").validate().unwrap_err();
        assert_eq!(
            err,
            SchemaError::EmptyFieldName {
                path: "<root>".into()
            }
        );
    }

    #[test]
    fn nested_collision_reports_path() {
        let schema = Schema::new().nested("outer", Schema::new().number("Foo").number("foo"));
        match schema.validate().unwrap_err() {
            SchemaError::AccessorCollision { path, .. } => assert_eq!(path, "outer"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
