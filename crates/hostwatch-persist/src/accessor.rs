//! Accessor naming and the per-object accessor table.
//!
//! Every leaf field `f` is exposed as a read accessor `Get<F>` and a write
//! accessor `Set<F>`, where `<F>` is `f` with its first letter upper-cased.
//! Composite fields are exposed under their own name. The table is built once
//! from the schema; resolution is an exact lookup with no case fallback.

use std::collections::BTreeMap;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{display_path, Schema, SchemaNode};

/// Prefix of read accessor names.
pub const READ_PREFIX: &str = "Get";

/// Prefix of write accessor names.
pub const WRITE_PREFIX: &str = "Set";

/// Read accessor name for a field (`isAlive` -> `GetIsAlive`).
pub fn read_accessor_name(field: &str) -> String {
    format!("{READ_PREFIX}{}", capitalize(field))
}

/// Write accessor name for a field (`isAlive` -> `SetIsAlive`).
pub fn write_accessor_name(field: &str) -> String {
    format!("{WRITE_PREFIX}{}", capitalize(field))
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorKind {
    Read,
    Write,
}

/// What a member name resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// A read or write accessor of a leaf field.
    Accessor { kind: AccessorKind, field: String },
    /// A nested object.
    Nested(String),
}

impl Binding {
    fn field(&self) -> &str {
        match self {
            Self::Accessor { field, .. } => field,
            Self::Nested(field) => field,
        }
    }
}

/// Member name to binding, for one schema node.
#[derive(Clone, Debug, Default)]
pub struct AccessorTable {
    bindings: BTreeMap<String, Binding>,
}

impl AccessorTable {
    /// Build the table for `schema`, failing on empty names or on two
    /// fields claiming the same member name.
    pub fn build(schema: &Schema, path: &[String]) -> SchemaResult<Self> {
        let mut table = Self::default();
        for (field, node) in schema.fields() {
            if field.is_empty() {
                return Err(SchemaError::EmptyFieldName {
                    path: display_path(path),
                });
            }
            match node {
                SchemaNode::Leaf(_) => {
                    table.insert(
                        path,
                        read_accessor_name(field),
                        Binding::Accessor {
                            kind: AccessorKind::Read,
                            field: field.to_string(),
                        },
                    )?;
                    table.insert(
                        path,
                        write_accessor_name(field),
                        Binding::Accessor {
                            kind: AccessorKind::Write,
                            field: field.to_string(),
                        },
                    )?;
                }
                SchemaNode::Composite(_) => {
                    table.insert(path, field.to_string(), Binding::Nested(field.to_string()))?;
                }
            }
        }
        Ok(table)
    }

    fn insert(&mut self, path: &[String], name: String, binding: Binding) -> SchemaResult<()> {
        if let Some(existing) = self.bindings.get(&name) {
            return Err(SchemaError::AccessorCollision {
                path: display_path(path),
                name,
                first: existing.field().to_string(),
                second: binding.field().to_string(),
            });
        }
        self.bindings.insert(name, binding);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Member names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}
