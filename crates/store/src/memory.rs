use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, Semaphore};

use crate::context::{RecordKey, StagedWrite};
use crate::{
    Backend, Collection, CommitError, EntityId, Record, Result, StoreError,
    TransactionStartError, TxContext, TxId, UniqueIndex, Version,
};

type Table = BTreeMap<EntityId, Record>;

/// Index name reported when an insert collides with an existing id.
pub const PRIMARY_KEY: &str = "primary_key";

/// Process-local backend with serializable commits.
///
/// Writes are staged in the [`TxContext`] and applied atomically under a
/// single write lock at commit time. Optimistic version checks detect lost
/// updates; [`Backend::lock_in`] provides pessimistic row locks for
/// read-modify-write sequences that must not interleave.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    tables: RwLock<HashMap<Collection, Table>>,
    row_locks: StdMutex<HashMap<RecordKey, Arc<Mutex<()>>>>,
    indexes: Vec<UniqueIndex>,
    slots: Option<(Arc<Semaphore>, usize)>,
    next_tx: AtomicU64,
    fail_next_commit: AtomicBool,
    fail_on_begin: AtomicBool,
}

impl InMemoryBackend {
    /// Creates an empty backend with no transaction limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of simultaneously open transactions.
    ///
    /// Must be called before the backend is cloned or shared.
    pub fn with_max_open_transactions(mut self, limit: usize) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.slots = Some((Arc::new(Semaphore::new(limit)), limit));
        }
        self
    }

    /// Declares a unique index checked on every commit.
    ///
    /// Must be called before the backend is cloned or shared.
    pub fn with_unique_index(mut self, index: UniqueIndex) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.indexes.push(index);
        }
        self
    }

    /// Makes the next commit fail with [`CommitError::Rejected`].
    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Makes every `begin` fail until reset.
    pub fn set_fail_on_begin(&self, fail: bool) {
        self.inner.fail_on_begin.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed records in a collection.
    pub async fn count(&self, collection: Collection) -> usize {
        self.inner
            .tables
            .read()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the number of row locks currently tracked.
    pub fn tracked_locks(&self) -> usize {
        self.inner.row_locks.lock().map_or(0, |locks| locks.len())
    }

    fn row_lock(&self, key: &RecordKey) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .inner
            .row_locks
            .lock()
            .map_err(|_| StoreError::Backend("row lock table poisoned".into()))?;
        Ok(locks.entry(key.clone()).or_default().clone())
    }

    /// Drops lock entries no transaction holds or waits on.
    fn prune_locks(&self) {
        if let Ok(mut locks) = self.inner.row_locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }

    async fn committed(&self, collection: Collection, id: &EntityId) -> Option<Record> {
        self.inner
            .tables
            .read()
            .await
            .get(&collection)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Resolves a record as seen by `ctx` without recording the read.
    async fn view(&self, ctx: &TxContext, key: &RecordKey) -> Option<Record> {
        match ctx.staged(key) {
            Some(StagedWrite::Insert { body }) => Some(Record {
                id: key.1.clone(),
                version: Version::first(),
                body: body.clone(),
            }),
            Some(StagedWrite::Update { body, version, .. }) => Some(Record {
                id: key.1.clone(),
                version: *version,
                body: body.clone(),
            }),
            Some(StagedWrite::Delete { .. }) => None,
            None => self.committed(key.0, &key.1).await,
        }
    }

    fn finish(&self, ctx: TxContext) {
        drop(ctx);
        self.prune_locks();
    }

    fn validate(
        &self,
        tables: &HashMap<Collection, Table>,
        ctx: &TxContext,
    ) -> std::result::Result<(), CommitError> {
        for key in &ctx.order {
            let Some(write) = ctx.writes.get(key) else {
                continue;
            };
            let (collection, id) = key;
            let current = tables.get(collection).and_then(|t| t.get(id));
            match write {
                StagedWrite::Insert { .. } => {
                    if current.is_some() {
                        return Err(CommitError::ConstraintViolation {
                            index: PRIMARY_KEY,
                            collection: *collection,
                            id: id.clone(),
                        });
                    }
                }
                StagedWrite::Update { expected, .. } | StagedWrite::Delete { expected } => {
                    let actual = current.map_or(Version::initial(), |r| r.version);
                    if actual != *expected {
                        return Err(CommitError::Conflict {
                            collection: *collection,
                            id: id.clone(),
                            expected: *expected,
                            actual,
                        });
                    }
                }
            }
        }

        for index in &self.inner.indexes {
            self.check_index(index, tables, ctx)?;
        }
        Ok(())
    }

    fn check_index(
        &self,
        index: &UniqueIndex,
        tables: &HashMap<Collection, Table>,
        ctx: &TxContext,
    ) -> std::result::Result<(), CommitError> {
        let written: Vec<(&EntityId, &Value)> = ctx
            .order
            .iter()
            .filter(|(collection, _)| *collection == index.collection)
            .filter_map(|key| match ctx.writes.get(key) {
                Some(StagedWrite::Insert { body }) | Some(StagedWrite::Update { body, .. }) => {
                    Some((&key.1, body))
                }
                _ => None,
            })
            .collect();
        if written.is_empty() {
            return Ok(());
        }

        let mut seen: HashMap<String, &EntityId> = HashMap::new();
        if let Some(table) = tables.get(&index.collection) {
            for (id, record) in table {
                if ctx.writes.contains_key(&(index.collection, id.clone())) {
                    continue;
                }
                if let Some(key) = index.key_of(&record.body) {
                    seen.insert(Value::Array(key).to_string(), id);
                }
            }
        }
        for (id, body) in written {
            let Some(key) = index.key_of(body) else {
                continue;
            };
            if seen.insert(Value::Array(key).to_string(), id).is_some() {
                return Err(CommitError::ConstraintViolation {
                    index: index.name,
                    collection: index.collection,
                    id: id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn begin(&self) -> Result<TxContext> {
        if self.inner.fail_on_begin.load(Ordering::SeqCst) {
            return Err(TransactionStartError::Unavailable("backend offline".into()).into());
        }
        let permit = match &self.inner.slots {
            Some((slots, limit)) => Some(
                slots
                    .clone()
                    .try_acquire_owned()
                    .map_err(|_| TransactionStartError::Exhausted { limit: *limit })?,
            ),
            None => None,
        };
        let id = TxId::new(self.inner.next_tx.fetch_add(1, Ordering::SeqCst) + 1);
        tracing::trace!(%id, "transaction opened");
        Ok(TxContext::new(id, permit))
    }

    async fn commit(&self, ctx: TxContext) -> Result<()> {
        let tx = ctx.id();
        if self.inner.fail_next_commit.swap(false, Ordering::SeqCst) {
            self.finish(ctx);
            return Err(StoreError::Commit {
                tx,
                cause: CommitError::Rejected("injected commit failure".into()),
            });
        }

        let mut tables = self.inner.tables.write().await;
        if let Err(cause) = self.validate(&tables, &ctx) {
            drop(tables);
            self.finish(ctx);
            return Err(StoreError::Commit { tx, cause });
        }

        for key in &ctx.order {
            let Some(write) = ctx.writes.get(key) else {
                continue;
            };
            let (collection, id) = key;
            let table = tables.entry(*collection).or_default();
            match write {
                StagedWrite::Insert { body } => {
                    table.insert(
                        id.clone(),
                        Record {
                            id: id.clone(),
                            version: Version::first(),
                            body: body.clone(),
                        },
                    );
                }
                StagedWrite::Update { body, version, .. } => {
                    table.insert(
                        id.clone(),
                        Record {
                            id: id.clone(),
                            version: *version,
                            body: body.clone(),
                        },
                    );
                }
                StagedWrite::Delete { .. } => {
                    table.remove(id);
                }
            }
        }
        drop(tables);

        tracing::trace!(%tx, writes = ctx.pending_writes(), "transaction applied");
        self.finish(ctx);
        Ok(())
    }

    async fn rollback(&self, ctx: TxContext) -> Result<()> {
        tracing::trace!(tx = %ctx.id(), discarded = ctx.pending_writes(), "transaction discarded");
        self.finish(ctx);
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &EntityId) -> Result<Option<Record>> {
        Ok(self.committed(collection, id).await)
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Record>> {
        Ok(self
            .inner
            .tables
            .read()
            .await
            .get(&collection)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_in(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
    ) -> Result<Option<Record>> {
        let key = (collection, id.clone());
        let record = self.view(ctx, &key).await;
        if ctx.staged(&key).is_none()
            && let Some(record) = &record
        {
            ctx.observe(key, record.version);
        }
        Ok(record)
    }

    async fn lock_in(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
    ) -> Result<Option<Record>> {
        let key = (collection, id.clone());
        if !ctx.locked.contains(&key) {
            let lock = self.row_lock(&key)?;
            let guard = lock.lock_owned().await;
            ctx.guards.push(guard);
            ctx.locked.insert(key.clone());
            // A read taken before the lock may be stale; re-observe under it.
            ctx.observed.remove(&key);
        }
        self.get_in(ctx, collection, id).await
    }

    async fn scan_in(&self, ctx: &mut TxContext, collection: Collection) -> Result<Vec<Record>> {
        let mut merged: Table = self
            .inner
            .tables
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default();
        for key in ctx.order.iter().filter(|(c, _)| *c == collection) {
            match self.view(ctx, key).await {
                Some(record) => {
                    merged.insert(key.1.clone(), record);
                }
                None => {
                    merged.remove(&key.1);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    async fn insert(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
        body: Value,
    ) -> Result<Version> {
        let key = (collection, id.clone());
        let write = match ctx.staged(&key) {
            Some(StagedWrite::Delete { expected }) => {
                let expected = *expected;
                StagedWrite::Update {
                    body,
                    expected,
                    version: expected.next(),
                }
            }
            Some(_) => {
                return Err(StoreError::Commit {
                    tx: ctx.id(),
                    cause: CommitError::ConstraintViolation {
                        index: PRIMARY_KEY,
                        collection,
                        id: id.clone(),
                    },
                });
            }
            None => StagedWrite::Insert { body },
        };
        let version = match &write {
            StagedWrite::Update { version, .. } => *version,
            _ => Version::first(),
        };
        ctx.stage(key, write);
        Ok(version)
    }

    async fn update(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
        body: Value,
    ) -> Result<Version> {
        let key = (collection, id.clone());
        let write = match ctx.staged(&key) {
            Some(StagedWrite::Insert { .. }) => StagedWrite::Insert { body },
            Some(StagedWrite::Update {
                expected, version, ..
            }) => StagedWrite::Update {
                body,
                expected: *expected,
                version: *version,
            },
            Some(StagedWrite::Delete { .. }) => {
                return Err(StoreError::RecordNotFound {
                    collection,
                    id: id.clone(),
                });
            }
            None => {
                let current = self.committed(collection, id).await.ok_or_else(|| {
                    StoreError::RecordNotFound {
                        collection,
                        id: id.clone(),
                    }
                })?;
                let expected = ctx.observed.get(&key).copied().unwrap_or(current.version);
                StagedWrite::Update {
                    body,
                    expected,
                    version: expected.next(),
                }
            }
        };
        let version = match &write {
            StagedWrite::Update { version, .. } => *version,
            _ => Version::first(),
        };
        ctx.stage(key, write);
        Ok(version)
    }

    async fn delete(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
    ) -> Result<bool> {
        let key = (collection, id.clone());
        match ctx.staged(&key) {
            Some(StagedWrite::Insert { .. }) => {
                ctx.writes.remove(&key);
                ctx.order.retain(|k| k != &key);
                Ok(true)
            }
            Some(StagedWrite::Update { expected, .. }) => {
                let expected = *expected;
                ctx.stage(key, StagedWrite::Delete { expected });
                Ok(true)
            }
            Some(StagedWrite::Delete { .. }) => Ok(false),
            None => match self.committed(collection, id).await {
                Some(current) => {
                    let expected = ctx.observed.get(&key).copied().unwrap_or(current.version);
                    ctx.stage(key, StagedWrite::Delete { expected });
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }
}
