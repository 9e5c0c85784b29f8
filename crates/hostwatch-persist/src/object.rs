//! Persistent objects: schema-shaped views over a shared field cache.
//!
//! A [`PersistentObject`] tree is built eagerly from a [`Schema`]. The root
//! and every nested object share one [`TreeCore`] holding the cache, the
//! storage adapter and the write coalescer; each object addresses its own
//! subtree by path. A write anywhere in the tree flushes the whole tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::accessor::{AccessorKind, AccessorTable, Binding};
use crate::cache::{ConsistencyMode, FieldCache};
use crate::coalescer::{run_flush, WriteCoalescer, WriteCompletion};
use crate::error::{PersistError, PersistResult, SchemaResult};
use crate::schema::{display_path, Schema, SchemaNode};
use crate::traits::StorageAdapter;
use crate::value::{FieldKind, FieldValue};

/// How a persistent object tree is backed.
#[derive(Clone)]
pub struct PersistOptions {
    pub mode: ConsistencyMode,
    pub storage: Arc<dyn StorageAdapter>,
}

impl PersistOptions {
    pub fn exclusive(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            mode: ConsistencyMode::Exclusive,
            storage,
        }
    }

    pub fn shared(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            mode: ConsistencyMode::Shared,
            storage,
        }
    }
}

impl fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// State shared by every object of one tree.
pub(crate) struct TreeCore {
    pub(crate) schema: Schema,
    pub(crate) mode: ConsistencyMode,
    pub(crate) storage: Arc<dyn StorageAdapter>,
    pub(crate) coalescer: WriteCoalescer,
    cache: Mutex<FieldCache>,
}

impl TreeCore {
    pub(crate) fn cache(&self) -> MutexGuard<'_, FieldCache> {
        self.cache.lock().expect("field cache lock poisoned")
    }

    /// Load the record and merge it into the whole tree. Never stores.
    async fn reload(&self) -> usize {
        let Some(loaded) = self.storage.load().await else {
            debug!("no stored state");
            return 0;
        };
        let assigned = self.cache().merge(&self.schema, &loaded);
        debug!(assigned, "merged stored state");
        assigned
    }
}

/// A schema instance whose fields are read and written asynchronously
/// through a storage adapter.
pub struct PersistentObject {
    core: Arc<TreeCore>,
    path: Vec<String>,
    schema: Schema,
    accessors: AccessorTable,
    children: BTreeMap<String, PersistentObject>,
}

impl PersistentObject {
    /// Build the object tree for `schema`.
    ///
    /// Fails if the schema has empty field names or colliding member names.
    pub fn new(schema: Schema, options: PersistOptions) -> SchemaResult<Self> {
        schema.validate()?;
        let core = Arc::new(TreeCore {
            cache: Mutex::new(FieldCache::new(&schema)),
            schema: schema.clone(),
            mode: options.mode,
            storage: options.storage,
            coalescer: WriteCoalescer::default(),
        });
        Self::build(core, schema, Vec::new())
    }

    fn build(core: Arc<TreeCore>, schema: Schema, path: Vec<String>) -> SchemaResult<Self> {
        let accessors = AccessorTable::build(&schema, &path)?;
        let mut children = BTreeMap::new();
        for (name, child_schema) in schema.composites() {
            let mut child_path = path.clone();
            child_path.push(name.to_string());
            let child = Self::build(Arc::clone(&core), child_schema.clone(), child_path)?;
            children.insert(name.to_string(), child);
        }
        Ok(Self {
            core,
            path,
            schema,
            accessors,
            children,
        })
    }

    pub fn mode(&self) -> ConsistencyMode {
        self.core.mode
    }

    /// The schema of this object's subtree.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Dotted path from the root (`<root>` for the root itself).
    pub fn path(&self) -> String {
        display_path(&self.path)
    }

    /// Read a leaf field.
    ///
    /// Exclusive mode answers from cache when the field is initialized and
    /// otherwise loads once; shared mode always loads first. Uninitialized
    /// fields read as `None`.
    pub async fn get(&self, field: &str) -> PersistResult<Option<FieldValue>> {
        self.leaf_kind(field)?;

        if self.core.mode == ConsistencyMode::Exclusive {
            if let Some(value) = self.cached(field) {
                trace!(path = %self.path(), field, "cache hit");
                return Ok(Some(value));
            }
        }

        self.core.reload().await;
        Ok(self.cached(field))
    }

    /// Write a leaf field.
    ///
    /// The cache is updated before this returns; the returned completion
    /// resolves once the flush carrying the write has finished.
    ///
    /// Must be called on a current-thread Tokio runtime: the flush is a task
    /// on that runtime and only starts once the writing task yields. Writes
    /// from a multi-threaded runtime fail with
    /// [`PersistError::MultiThreadRuntime`] and leave the cache untouched.
    pub fn set(&self, field: &str, value: impl Into<FieldValue>) -> WriteCompletion {
        match self.enqueue_write(field, value.into()) {
            Ok(receiver) => WriteCompletion::pending(receiver),
            Err(e) => WriteCompletion::failed(e),
        }
    }

    fn enqueue_write(
        &self,
        field: &str,
        value: FieldValue,
    ) -> PersistResult<oneshot::Receiver<PersistResult<()>>> {
        let expected = self.leaf_kind(field)?;
        if value.kind() != expected {
            return Err(PersistError::TypeMismatch {
                path: self.path(),
                field: field.to_string(),
                expected,
                found: value.kind(),
            });
        }
        let runtime = Handle::try_current().map_err(|_| PersistError::NoRuntime)?;
        if runtime.runtime_flavor() != RuntimeFlavor::CurrentThread {
            return Err(PersistError::MultiThreadRuntime);
        }

        let generation = self
            .core
            .cache()
            .assign(&self.path, field, value)
            .ok_or_else(|| self.unknown_field(field))?;

        let (tx, rx) = oneshot::channel();
        if self.core.coalescer.enqueue(tx) {
            runtime.spawn(run_flush(Arc::clone(&self.core)));
        }
        trace!(path = %self.path(), field, generation, "write queued");
        Ok(rx)
    }

    /// The nested object behind a composite field.
    pub fn nested(&self, field: &str) -> PersistResult<&PersistentObject> {
        match self.schema.field(field) {
            Some(SchemaNode::Composite(_)) => self
                .children
                .get(field)
                .ok_or_else(|| self.unknown_field(field)),
            Some(SchemaNode::Leaf(_)) => Err(PersistError::NotComposite {
                path: self.path(),
                field: field.to_string(),
            }),
            None => Err(self.unknown_field(field)),
        }
    }

    /// Resolve a member name: `Get<Field>`, `Set<Field>` or the name of a
    /// nested field.
    pub fn member(&self, name: &str) -> PersistResult<Member<'_>> {
        let binding = self
            .accessors
            .resolve(name)
            .ok_or_else(|| PersistError::UnknownAccessor {
                path: self.path(),
                name: name.to_string(),
            })?;
        Ok(match binding {
            Binding::Accessor {
                kind: AccessorKind::Read,
                field,
            } => Member::Read(ReadAccessor {
                object: self,
                field,
            }),
            Binding::Accessor {
                kind: AccessorKind::Write,
                field,
            } => Member::Write(WriteAccessor {
                object: self,
                field,
            }),
            Binding::Nested(field) => Member::Nested(self.nested(field)?),
        })
    }

    /// All member names of this object, sorted.
    pub fn accessor_names(&self) -> impl Iterator<Item = &str> {
        self.accessors.names()
    }

    /// The cached state of this object's subtree, shaped like the stored
    /// record. Does not touch storage.
    pub fn snapshot(&self) -> Value {
        let (mut node, _) = self.core.cache().snapshot();
        for segment in &self.path {
            node = match node.get_mut(segment.as_str()) {
                Some(child) => child.take(),
                None => return Value::Object(Map::new()),
            };
        }
        node
    }

    /// Number of completed flushes of this tree.
    pub fn flush_count(&self) -> u64 {
        self.core.coalescer.flush_count()
    }

    /// Whether the tree has no flush scheduled or in flight.
    pub fn is_idle(&self) -> bool {
        self.core.coalescer.is_idle()
    }

    fn cached(&self, field: &str) -> Option<FieldValue> {
        self.core.cache().get(&self.path, field).cloned()
    }

    fn leaf_kind(&self, field: &str) -> PersistResult<FieldKind> {
        match self.schema.field(field) {
            Some(SchemaNode::Leaf(kind)) => Ok(*kind),
            Some(SchemaNode::Composite(_)) => Err(PersistError::NotALeaf {
                path: self.path(),
                field: field.to_string(),
            }),
            None => Err(self.unknown_field(field)),
        }
    }

    fn unknown_field(&self, field: &str) -> PersistError {
        PersistError::UnknownField {
            path: self.path(),
            field: field.to_string(),
        }
    }
}

impl fmt::Debug for PersistentObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentObject")
            .field("path", &self.path())
            .field("mode", &self.core.mode)
            .field("members", &self.accessors.names().collect::<Vec<_>>())
            .finish()
    }
}

/// A resolved member of a [`PersistentObject`].
#[derive(Debug)]
pub enum Member<'a> {
    Read(ReadAccessor<'a>),
    Write(WriteAccessor<'a>),
    Nested(&'a PersistentObject),
}

impl<'a> Member<'a> {
    pub fn into_read(self) -> Option<ReadAccessor<'a>> {
        match self {
            Self::Read(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_write(self) -> Option<WriteAccessor<'a>> {
        match self {
            Self::Write(w) => Some(w),
            _ => None,
        }
    }

    pub fn into_nested(self) -> Option<&'a PersistentObject> {
        match self {
            Self::Nested(n) => Some(n),
            _ => None,
        }
    }
}

/// The read accessor of one leaf field.
#[derive(Clone, Copy, Debug)]
pub struct ReadAccessor<'a> {
    object: &'a PersistentObject,
    field: &'a str,
}

impl ReadAccessor<'_> {
    pub fn field(&self) -> &str {
        self.field
    }

    pub async fn call(&self) -> PersistResult<Option<FieldValue>> {
        self.object.get(self.field).await
    }
}

/// The write accessor of one leaf field.
#[derive(Clone, Copy, Debug)]
pub struct WriteAccessor<'a> {
    object: &'a PersistentObject,
    field: &'a str,
}

impl WriteAccessor<'_> {
    pub fn field(&self) -> &str {
        self.field
    }

    pub fn call(&self, value: impl Into<FieldValue>) -> WriteCompletion {
        self.object.set(self.field, value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::error::{StorageError, StorageResult};
    use crate::memory::InMemoryStorage;

    fn flat() -> Schema {
        Schema::new().number("a").string("b").boolean("c")
    }

    fn one_level() -> Schema {
        Schema::new()
            .string("a")
            .nested("b", Schema::new().number("c"))
    }

    fn deep() -> Schema {
        Schema::new().number("id").nested(
            "profile",
            Schema::new().string("username").boolean("sex").nested(
                "contacts",
                Schema::new()
                    .string("phone")
                    .nested("messengers", Schema::new().string("skype")),
            ),
        )
    }

    fn exclusive(schema: Schema, storage: &Arc<InMemoryStorage>) -> PersistentObject {
        PersistentObject::new(schema, PersistOptions::exclusive(storage.clone())).unwrap()
    }

    fn shared(schema: Schema, storage: &Arc<InMemoryStorage>) -> PersistentObject {
        PersistentObject::new(schema, PersistOptions::shared(storage.clone())).unwrap()
    }

    /// Lets the flush task and anything it woke run to completion.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    /// Storage whose stores block until the test releases them.
    struct GatedStorage {
        inner: InMemoryStorage,
        gate: Semaphore,
        started: AtomicUsize,
        history: Mutex<Vec<Value>>,
    }

    impl GatedStorage {
        fn new() -> Self {
            Self {
                inner: InMemoryStorage::new(),
                gate: Semaphore::new(0),
                started: AtomicUsize::new(0),
                history: Mutex::new(Vec::new()),
            }
        }

        async fn wait_for_started(&self, n: usize) {
            while self.started.load(Ordering::SeqCst) < n {
                tokio::task::yield_now().await;
            }
        }
    }

    #[async_trait]
    impl StorageAdapter for GatedStorage {
        async fn load(&self) -> Option<Value> {
            self.inner.load().await
        }

        async fn store(&self, state: Value) -> StorageResult<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            self.history.lock().unwrap().push(state.clone());
            self.inner.store(state).await
        }
    }

    /// Storage that rejects the first `failures` stores.
    struct FlakyStorage {
        inner: InMemoryStorage,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl StorageAdapter for FlakyStorage {
        async fn load(&self) -> Option<Value> {
            self.inner.load().await
        }

        async fn store(&self, state: Value) -> StorageResult<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StorageError::Unavailable("disk full".into()));
            }
            self.inner.store(state).await
        }
    }

    // ---- basic behaviour ----

    #[tokio::test]
    async fn acts_like_a_regular_object() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        obj.set("a", 10).await.unwrap();
        assert_eq!(obj.get("a").await.unwrap(), Some(FieldValue::from(10)));
    }

    #[tokio::test]
    async fn last_assignment_wins() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        obj.set("b", "1").await.unwrap();
        obj.set("b", "2").await.unwrap();
        obj.set("b", "3").await.unwrap();

        assert_eq!(obj.get("b").await.unwrap(), Some(FieldValue::from("3")));
    }

    #[tokio::test]
    async fn reflects_stored_state() {
        let storage = Arc::new(InMemoryStorage::with_value(
            json!({ "a": 10, "b": "2", "c": true }),
        ));
        let obj = exclusive(flat(), &storage);

        assert_eq!(obj.get("a").await.unwrap(), Some(FieldValue::from(10)));
    }

    #[tokio::test]
    async fn interleaved_sets_and_gets() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        obj.set("a", 10).await.unwrap();
        obj.set("b", "20").await.unwrap();
        let a0 = obj.get("a").await.unwrap();
        let b0 = obj.get("b").await.unwrap();

        obj.set("b", "30").await.unwrap();
        obj.set("a", 40).await.unwrap();
        let a1 = obj.get("a").await.unwrap();
        let b1 = obj.get("b").await.unwrap();

        assert_eq!(a0, Some(FieldValue::from(10)));
        assert_eq!(b0, Some(FieldValue::from("20")));
        assert_eq!(a1, Some(FieldValue::from(40)));
        assert_eq!(b1, Some(FieldValue::from("30")));
    }

    // ---- coalescing ----

    #[tokio::test]
    async fn unawaited_writes_share_one_store() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        let _ = obj.set("a", 1);
        let _ = obj.set("a", 2);
        let _ = obj.set("b", "3");
        obj.set("a", 4).await.unwrap();

        assert_eq!(storage.store_count(), 1);
        assert_eq!(storage.value(), Some(json!({ "a": 4, "b": "3" })));
        assert_eq!(obj.flush_count(), 1);
    }

    #[tokio::test]
    async fn awaited_writes_each_store() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        obj.set("a", 1).await.unwrap();
        obj.set("a", 2).await.unwrap();
        obj.set("a", 3).await.unwrap();

        assert_eq!(storage.store_count(), 3);
        assert!(obj.is_idle());
    }

    #[tokio::test]
    async fn every_coalesced_completion_resolves_after_the_store() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        let first = obj.set("a", 1);
        let second = obj.set("b", "x");
        assert_eq!(storage.store_count(), 0);

        first.await.unwrap();
        assert_eq!(storage.store_count(), 1);
        second.await.unwrap();
        assert_eq!(storage.store_count(), 1);
    }

    #[tokio::test]
    async fn deferred_write_is_visible_to_a_fresh_object() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = shared(flat(), &storage);

        let _ = obj.set("a", 10);
        let _ = obj.set("b", "20");
        obj.set("c", true).await.unwrap();

        let fresh = exclusive(flat(), &storage);
        assert_eq!(fresh.get("a").await.unwrap(), Some(FieldValue::from(10)));
        assert_eq!(fresh.get("b").await.unwrap(), Some(FieldValue::from("20")));
        assert_eq!(fresh.get("c").await.unwrap(), Some(FieldValue::from(true)));
        assert_eq!(storage.store_count(), 1);
    }

    #[tokio::test]
    async fn write_during_store_starts_a_new_cycle() {
        let storage = Arc::new(GatedStorage::new());
        let obj = PersistentObject::new(flat(), PersistOptions::exclusive(storage.clone())).unwrap();

        let first = obj.set("a", 1);
        storage.wait_for_started(1).await;

        // The first snapshot is already taken; this must not ride along.
        let second = obj.set("a", 2);
        assert_eq!(obj.flush_count(), 0);

        storage.gate.add_permits(2);
        first.await.unwrap();
        second.await.unwrap();

        let history = storage.history.lock().unwrap().clone();
        assert_eq!(history, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
        assert_eq!(obj.flush_count(), 2);
    }

    #[tokio::test]
    async fn only_one_store_in_flight() {
        let storage = Arc::new(GatedStorage::new());
        let obj = PersistentObject::new(flat(), PersistOptions::exclusive(storage.clone())).unwrap();

        let _first = obj.set("a", 1);
        storage.wait_for_started(1).await;
        let _second = obj.set("b", "2");
        let _third = obj.set("c", false);
        settle().await;

        assert_eq!(storage.started.load(Ordering::SeqCst), 1);
        storage.gate.add_permits(2);
        settle().await;
        assert_eq!(storage.started.load(Ordering::SeqCst), 2);
        assert_eq!(
            storage.inner.value(),
            Some(json!({ "a": 1, "b": "2", "c": false }))
        );
    }

    #[tokio::test]
    async fn store_failure_fails_every_coalesced_write() {
        let storage = Arc::new(FlakyStorage {
            inner: InMemoryStorage::new(),
            failures: AtomicUsize::new(1),
        });
        let obj = PersistentObject::new(flat(), PersistOptions::exclusive(storage.clone())).unwrap();

        let first = obj.set("a", 1);
        let second = obj.set("b", "x");
        assert!(matches!(first.await, Err(PersistError::Store(_))));
        assert!(matches!(second.await, Err(PersistError::Store(_))));

        // Values stay cached and ride along with the next flush.
        assert_eq!(obj.get("a").await.unwrap(), Some(FieldValue::from(1)));
        obj.set("c", true).await.unwrap();
        assert_eq!(
            storage.inner.value(),
            Some(json!({ "a": 1, "b": "x", "c": true }))
        );
    }

    #[tokio::test]
    async fn failed_write_does_not_mask_values_stored_later() {
        let storage = Arc::new(FlakyStorage {
            inner: InMemoryStorage::new(),
            failures: AtomicUsize::new(1),
        });
        let mine = PersistentObject::new(flat(), PersistOptions::shared(storage.clone())).unwrap();
        let other = PersistentObject::new(flat(), PersistOptions::shared(storage.clone())).unwrap();

        assert!(matches!(mine.set("b", "mine").await, Err(PersistError::Store(_))));
        other.set("b", "theirs").await.unwrap();
        assert_eq!(storage.inner.value(), Some(json!({ "b": "theirs" })));

        for _ in 0..3 {
            assert_eq!(mine.get("b").await.unwrap(), Some(FieldValue::from("theirs")));
        }
    }

    // ---- consistency modes ----

    #[tokio::test]
    async fn exclusive_skips_load_for_initialized_fields() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        let _ = obj.set("a", 1);
        let _ = obj.set("b", "2");
        obj.get("a").await.unwrap();
        obj.get("b").await.unwrap();

        assert_eq!(storage.load_count(), 0);
    }

    #[tokio::test]
    async fn exclusive_uninitialized_read_loads_once() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        assert_eq!(obj.get("a").await.unwrap(), None);
        assert_eq!(storage.load_count(), 1);
    }

    #[tokio::test]
    async fn exclusive_load_initializes_sibling_fields() {
        let storage = Arc::new(InMemoryStorage::with_value(json!({ "a": 1, "b": "x" })));
        let obj = exclusive(flat(), &storage);

        obj.get("a").await.unwrap();
        assert_eq!(obj.get("b").await.unwrap(), Some(FieldValue::from("x")));
        obj.get("a").await.unwrap();
        assert_eq!(storage.load_count(), 1);
    }

    #[tokio::test]
    async fn exclusive_ignores_external_writes_once_initialized() {
        let storage = Arc::new(InMemoryStorage::new());
        let owner = exclusive(flat(), &storage);
        let other = exclusive(flat(), &storage);

        owner.set("b", "mine").await.unwrap();
        other.set("b", "theirs").await.unwrap();

        assert_eq!(owner.get("b").await.unwrap(), Some(FieldValue::from("mine")));
    }

    #[tokio::test]
    async fn shared_loads_on_every_read() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = shared(flat(), &storage);

        obj.set("a", 10).await.unwrap();
        obj.get("a").await.unwrap();
        obj.get("a").await.unwrap();
        obj.get("a").await.unwrap();

        assert_eq!(storage.load_count(), 3);
    }

    #[tokio::test]
    async fn shared_observes_other_writers() {
        let storage = Arc::new(InMemoryStorage::new());
        let first = shared(flat(), &storage);
        let second = shared(flat(), &storage);

        first.set("b", "1").await.unwrap();
        second.set("b", "2").await.unwrap();

        assert_eq!(first.get("b").await.unwrap(), Some(FieldValue::from("2")));
    }

    #[tokio::test]
    async fn shared_reload_keeps_pending_local_write() {
        let storage = Arc::new(InMemoryStorage::with_value(json!({ "a": 1 })));
        let obj = shared(flat(), &storage);

        let pending = obj.set("a", 2);
        assert_eq!(obj.get("a").await.unwrap(), Some(FieldValue::from(2)));

        pending.await.unwrap();
        assert_eq!(storage.value(), Some(json!({ "a": 2 })));
    }

    // ---- nesting ----

    #[tokio::test]
    async fn nested_write_and_read() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(one_level(), &storage);

        obj.nested("b").unwrap().set("c", 10).await.unwrap();
        assert_eq!(
            obj.nested("b").unwrap().get("c").await.unwrap(),
            Some(FieldValue::from(10))
        );
    }

    #[tokio::test]
    async fn nested_write_stores_whole_tree_shape() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(one_level(), &storage);

        obj.nested("b").unwrap().set("c", 10).await.unwrap();
        assert_eq!(storage.value(), Some(json!({ "b": { "c": 10 } })));
    }

    #[tokio::test]
    async fn nested_write_preserves_siblings() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(one_level(), &storage);

        obj.set("a", "top").await.unwrap();
        obj.nested("b").unwrap().set("c", 1).await.unwrap();

        assert_eq!(storage.value(), Some(json!({ "a": "top", "b": { "c": 1 } })));
        assert_eq!(obj.nested("b").unwrap().snapshot(), json!({ "c": 1 }));
    }

    #[tokio::test]
    async fn nested_state_loads_in_fresh_object() {
        let storage = Arc::new(InMemoryStorage::new());
        let producer = shared(one_level(), &storage);
        producer.nested("b").unwrap().set("c", 10).await.unwrap();

        let consumer = shared(one_level(), &storage);
        assert_eq!(
            consumer.nested("b").unwrap().get("c").await.unwrap(),
            Some(FieldValue::from(10))
        );
    }

    #[tokio::test]
    async fn reconstructing_state_never_stores() {
        let storage = Arc::new(InMemoryStorage::new());
        let producer = shared(one_level(), &storage);
        producer.nested("b").unwrap().set("c", 10).await.unwrap();
        let stores = storage.store_count();

        let consumer = shared(one_level(), &storage);
        consumer.nested("b").unwrap().get("c").await.unwrap();
        settle().await;

        assert_eq!(storage.store_count(), stores);
        assert!(consumer.is_idle());
    }

    #[tokio::test]
    async fn deep_round_trip() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(deep(), &storage);
        let profile = obj.nested("profile").unwrap();
        let contacts = profile.nested("contacts").unwrap();
        let messengers = contacts.nested("messengers").unwrap();

        obj.set("id", 10).await.unwrap();
        profile.set("username", "Noname").await.unwrap();
        profile.set("sex", true).await.unwrap();
        contacts.set("phone", "12345").await.unwrap();
        messengers.set("skype", "noname#123").await.unwrap();

        let fresh = exclusive(deep(), &storage);
        let skype = fresh
            .nested("profile")
            .and_then(|p| p.nested("contacts"))
            .and_then(|c| c.nested("messengers"))
            .unwrap()
            .get("skype")
            .await
            .unwrap();
        assert_eq!(skype, Some(FieldValue::from("noname#123")));
        assert_eq!(
            fresh.nested("profile").unwrap().get("username").await.unwrap(),
            Some(FieldValue::from("Noname"))
        );
        assert_eq!(messengers.path(), "profile.contacts.messengers");
    }

    // ---- accessors ----

    #[tokio::test]
    async fn members_resolve_to_accessors_and_children() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(one_level(), &storage);

        let set_a = obj.member("SetA").unwrap().into_write().unwrap();
        set_a.call("hello").await.unwrap();

        let get_a = obj.member("GetA").unwrap().into_read().unwrap();
        assert_eq!(get_a.field(), "a");
        assert_eq!(get_a.call().await.unwrap(), Some(FieldValue::from("hello")));

        let b = obj.member("b").unwrap().into_nested().unwrap();
        b.member("SetC").unwrap().into_write().unwrap().call(3).await.unwrap();
        assert_eq!(storage.value(), Some(json!({ "a": "hello", "b": { "c": 3 } })));

        assert_eq!(
            obj.accessor_names().collect::<Vec<_>>(),
            vec!["GetA", "SetA", "b"]
        );
    }

    #[tokio::test]
    async fn accessor_resolution_is_stable() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(Schema::new().boolean("isAlive"), &storage);

        let first = obj.member("GetIsAlive").unwrap().into_read().unwrap();
        let second = obj.member("GetIsAlive").unwrap().into_read().unwrap();
        assert!(std::ptr::eq(first.field(), second.field()));
    }

    // Unknown names are errors, never silent no-ops.

    #[tokio::test]
    async fn unknown_accessor_is_an_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(Schema::new().boolean("isAlive"), &storage);

        for name in ["getIsAlive", "GetisAlive", "GetMissing", "isAlive"] {
            assert!(matches!(
                obj.member(name),
                Err(PersistError::UnknownAccessor { .. })
            ));
        }
    }

    #[tokio::test]
    async fn unknown_field_is_an_error_and_costs_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        assert!(matches!(
            obj.get("zzz").await,
            Err(PersistError::UnknownField { .. })
        ));
        assert!(matches!(
            obj.set("zzz", 1).await,
            Err(PersistError::UnknownField { .. })
        ));
        assert_eq!(storage.load_count(), 0);
        assert_eq!(storage.store_count(), 0);
    }

    #[tokio::test]
    async fn leaf_and_composite_are_not_interchangeable() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(one_level(), &storage);

        assert!(matches!(obj.get("b").await, Err(PersistError::NotALeaf { .. })));
        assert!(matches!(obj.set("b", 1).await, Err(PersistError::NotALeaf { .. })));
        assert!(matches!(obj.nested("a"), Err(PersistError::NotComposite { .. })));
    }

    #[tokio::test]
    async fn type_mismatch_leaves_cache_untouched() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        let err = obj.set("a", "ten").await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::TypeMismatch {
                expected: FieldKind::Number,
                found: FieldKind::String,
                ..
            }
        ));
        assert_eq!(obj.snapshot(), json!({}));
        assert_eq!(storage.store_count(), 0);
    }

    #[test]
    fn write_outside_a_runtime_fails() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        let completion = obj.set("a", 1);
        let result = block_on(completion);
        assert!(matches!(result, Err(PersistError::NoRuntime)));
        assert_eq!(obj.snapshot(), json!({}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn multi_thread_runtime_writes_are_rejected() {
        let storage = Arc::new(InMemoryStorage::new());
        let obj = exclusive(flat(), &storage);

        let pending: Vec<_> = (0..2000)
            .map(|i| {
                if i % 2 == 0 {
                    obj.set("a", i)
                } else {
                    obj.set("b", i.to_string())
                }
            })
            .collect();
        for completion in pending {
            assert!(matches!(completion.await, Err(PersistError::MultiThreadRuntime)));
        }

        assert_eq!(obj.snapshot(), json!({}));
        assert!(obj.is_idle());
        assert_eq!(storage.store_count(), 0);
    }

    fn block_on(completion: WriteCompletion) -> PersistResult<()> {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(completion)
    }

    #[test]
    fn invalid_schema_is_rejected() {
        let storage = Arc::new(InMemoryStorage::new());
        let result = PersistentObject::new(
            Schema::new().number("Foo").number("foo"),
            PersistOptions::exclusive(storage),
        );
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn unawaited_write_sequences_cost_one_store(
            writes in prop::collection::vec((0usize..3, any::<i64>()), 1..24)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let storage = Arc::new(InMemoryStorage::new());
                let obj = exclusive(Schema::new().number("x").number("y").number("z"), &storage);
                let names = ["x", "y", "z"];

                let mut expected = Map::new();
                let mut last = None;
                for (idx, value) in &writes {
                    last = Some(obj.set(names[*idx], *value));
                    expected.insert(names[*idx].to_string(), json!(value));
                }
                last.unwrap().await.unwrap();

                assert_eq!(storage.store_count(), 1);
                assert_eq!(storage.value(), Some(Value::Object(expected)));
            });
        }
    }
}
