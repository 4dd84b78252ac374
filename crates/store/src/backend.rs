use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{EntityId, Result, TxContext, Version};

/// Name of a group of records (a table or document collection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Collection(&'static str);

impl Collection {
    /// Creates a collection name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the collection name.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored record with its committed version.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: EntityId,
    pub version: Version,
    pub body: Value,
}

impl Record {
    /// Deserializes the record body into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Unique constraint over one or more top-level body fields of a collection.
#[derive(Debug, Clone, Copy)]
pub struct UniqueIndex {
    pub name: &'static str,
    pub collection: Collection,
    pub fields: &'static [&'static str],
}

impl UniqueIndex {
    /// Extracts this index's key from a record body.
    ///
    /// Returns `None` when any indexed field is missing or null, which
    /// exempts the record from the constraint.
    pub fn key_of(&self, body: &Value) -> Option<Vec<Value>> {
        self.fields
            .iter()
            .map(|field| body.get(*field).filter(|v| !v.is_null()).cloned())
            .collect()
    }
}

/// Persistence backend consumed by the unit of work and the repositories.
///
/// Reads come in two flavours: committed reads (`get`, `scan`) used by the
/// query path, and transactional reads (`get_in`, `lock_in`, `scan_in`) that
/// see the transaction's own staged writes. Every write names the
/// [`TxContext`] it belongs to; nothing is visible to other readers until
/// [`Backend::commit`] succeeds.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<TxContext>;

    /// Durably applies everything issued against `ctx`, or nothing.
    ///
    /// The context is consumed whether or not the commit succeeds.
    async fn commit(&self, ctx: TxContext) -> Result<()>;

    /// Discards everything issued against `ctx`.
    async fn rollback(&self, ctx: TxContext) -> Result<()>;

    /// Reads the committed state of a record.
    async fn get(&self, collection: Collection, id: &EntityId) -> Result<Option<Record>>;

    /// Reads every committed record of a collection, ordered by id.
    async fn scan(&self, collection: Collection) -> Result<Vec<Record>>;

    /// Reads a record as seen by `ctx`.
    async fn get_in(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
    ) -> Result<Option<Record>>;

    /// Reads a record as seen by `ctx` and holds an exclusive lock on it
    /// until the transaction ends. Concurrent lockers of the same record wait.
    async fn lock_in(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
    ) -> Result<Option<Record>>;

    /// Reads every record of a collection as seen by `ctx`.
    async fn scan_in(&self, ctx: &mut TxContext, collection: Collection) -> Result<Vec<Record>>;

    /// Stages the insertion of a new record. Returns the version it will commit at.
    async fn insert(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
        body: Value,
    ) -> Result<Version>;

    /// Stages the replacement of an existing record. Returns the version it will commit at.
    async fn update(
        &self,
        ctx: &mut TxContext,
        collection: Collection,
        id: &EntityId,
        body: Value,
    ) -> Result<Version>;

    /// Stages the removal of a record. Returns whether it existed.
    async fn delete(&self, ctx: &mut TxContext, collection: Collection, id: &EntityId)
    -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIRS: UniqueIndex = UniqueIndex {
        name: "product_warehouse",
        collection: Collection::new("inventory"),
        fields: &["product_id", "warehouse_id"],
    };

    #[test]
    fn unique_key_uses_all_fields() {
        let body = serde_json::json!({"product_id": "P1", "warehouse_id": "W1", "quantity": 3});
        let key = PAIRS.key_of(&body).unwrap();
        assert_eq!(key, vec![serde_json::json!("P1"), serde_json::json!("W1")]);
    }

    #[test]
    fn unique_key_skips_records_missing_a_field() {
        let body = serde_json::json!({"product_id": "P1", "warehouse_id": null});
        assert!(PAIRS.key_of(&body).is_none());
    }

    #[test]
    fn record_decode() {
        #[derive(serde::Deserialize)]
        struct Thing {
            name: String,
        }
        let record = Record {
            id: EntityId::new("1"),
            version: Version::first(),
            body: serde_json::json!({"name": "widget"}),
        };
        let thing: Thing = record.decode().unwrap();
        assert_eq!(thing.name, "widget");
    }
}
