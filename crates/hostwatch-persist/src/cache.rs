//! In-memory mirror of a schema tree's field values.
//!
//! One [`FieldCache`] backs a whole tree of persistent objects. Each leaf is
//! either uninitialized or holds exactly one value. Every local assignment
//! bumps a generation counter. When a flush concludes, successfully or not,
//! the generation it captured is marked settled; leaves written after the
//! settled generation carry writes still on their way to storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::schema::{display_path, Schema, SchemaNode};
use crate::value::FieldValue;

/// How reads decide whether to consult storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    /// The object owns its record: initialized leaves are never reloaded.
    #[default]
    Exclusive,
    /// Other writers may change the record: every read reloads first.
    Shared,
}

#[derive(Clone, Debug, Default)]
struct Slot {
    value: Option<FieldValue>,
    /// Generation of the last local assignment, 0 if only ever loaded.
    written_at: u64,
}

#[derive(Clone, Debug, Default)]
struct CacheNode {
    leaves: BTreeMap<String, Slot>,
    children: BTreeMap<String, CacheNode>,
}

impl CacheNode {
    fn from_schema(schema: &Schema) -> Self {
        let mut node = Self::default();
        for (name, decl) in schema.fields() {
            match decl {
                SchemaNode::Leaf(_) => {
                    node.leaves.insert(name.to_string(), Slot::default());
                }
                SchemaNode::Composite(child) => {
                    node.children
                        .insert(name.to_string(), CacheNode::from_schema(child));
                }
            }
        }
        node
    }

    fn descend(&self, path: &[String]) -> Option<&CacheNode> {
        path.iter().try_fold(self, |node, seg| node.children.get(seg))
    }

    fn descend_mut(&mut self, path: &[String]) -> Option<&mut CacheNode> {
        path.iter()
            .try_fold(self, |node, seg| node.children.get_mut(seg))
    }

    fn snapshot(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, slot) in &self.leaves {
            if let Some(value) = &slot.value {
                out.insert(name.clone(), value.to_json());
            }
        }
        for (name, child) in &self.children {
            let nested = child.snapshot();
            if !nested.is_empty() {
                out.insert(name.clone(), Value::Object(nested));
            }
        }
        out
    }
}

/// Field values of one persistent object tree.
#[derive(Debug)]
pub struct FieldCache {
    root: CacheNode,
    generation: u64,
    settled: u64,
}

impl FieldCache {
    /// An empty cache with one uninitialized slot per leaf of `schema`.
    pub fn new(schema: &Schema) -> Self {
        Self {
            root: CacheNode::from_schema(schema),
            generation: 0,
            settled: 0,
        }
    }

    /// The value of `field` in the node at `path`, if initialized.
    pub fn get(&self, path: &[String], field: &str) -> Option<&FieldValue> {
        self.root
            .descend(path)?
            .leaves
            .get(field)?
            .value
            .as_ref()
    }

    pub fn is_initialized(&self, path: &[String], field: &str) -> bool {
        self.get(path, field).is_some()
    }

    /// Whether `field` holds a local write whose flush has not concluded.
    pub fn is_pending(&self, path: &[String], field: &str) -> bool {
        self.root
            .descend(path)
            .and_then(|node| node.leaves.get(field))
            .is_some_and(|slot| slot.written_at > self.settled)
    }

    /// Record a local write. Returns the new generation, or `None` when the
    /// path or field does not exist.
    pub fn assign(&mut self, path: &[String], field: &str, value: FieldValue) -> Option<u64> {
        let generation = self.generation + 1;
        let slot = self.root.descend_mut(path)?.leaves.get_mut(field)?;
        slot.value = Some(value);
        slot.written_at = generation;
        self.generation = generation;
        Some(generation)
    }

    /// Merge a loaded snapshot of the whole tree into the cache.
    ///
    /// Leaves present in `loaded` with the declared kind are assigned;
    /// absent leaves keep their value; writes whose flush is still scheduled
    /// or in flight are kept.
    /// Returns the number of leaves assigned.
    pub fn merge(&mut self, schema: &Schema, loaded: &Value) -> usize {
        let settled = self.settled;
        let mut path = Vec::new();
        merge_node(&mut self.root, schema, loaded, settled, &mut path)
    }

    /// Serialize every initialized leaf, nested objects nested and empty
    /// objects omitted, together with the generation it reflects.
    pub fn snapshot(&self) -> (Value, u64) {
        (Value::Object(self.root.snapshot()), self.generation)
    }

    /// Mark all writes up to `generation` as no longer in flight.
    ///
    /// Called after every flush, including failed ones: a value whose store
    /// failed stays cached but is no longer shielded from reloads.
    pub fn settle(&mut self, generation: u64) {
        self.settled = self.settled.max(generation);
    }

    /// Generation of the latest local write.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn merge_node(
    node: &mut CacheNode,
    schema: &Schema,
    loaded: &Value,
    settled: u64,
    path: &mut Vec<String>,
) -> usize {
    let Some(loaded) = loaded.as_object() else {
        debug!(path = %display_path(path), "ignoring non-object snapshot node");
        return 0;
    };

    let mut assigned = 0;
    for (name, decl) in schema.fields() {
        let Some(incoming) = loaded.get(name) else {
            continue;
        };
        match decl {
            SchemaNode::Leaf(kind) => {
                let Some(slot) = node.leaves.get_mut(name) else {
                    continue;
                };
                if slot.written_at > settled {
                    continue;
                }
                match FieldValue::from_json(incoming) {
                    Some(value) if value.kind() == *kind => {
                        slot.value = Some(value);
                        assigned += 1;
                    }
                    None if incoming.is_null() => {}
                    _ => debug!(
                        path = %display_path(path),
                        field = name,
                        expected = %kind,
                        "ignoring loaded value of the wrong kind"
                    ),
                }
            }
            SchemaNode::Composite(child_schema) => {
                if let Some(child) = node.children.get_mut(name) {
                    path.push(name.to_string());
                    assigned += merge_node(child, child_schema, incoming, settled, path);
                    path.pop();
                }
            }
        }
    }
    assigned
}
