//! In-process document store

use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::error::{Error, Result};
use crate::types::{DeleteAck, InsertAck, Target, UpdateAck};

type Document = Map<String, Value>;

/// Keeps collections in memory, keyed by (database, collection).
///
/// Filters support equality on top-level fields and dotted paths; query
/// operators are rejected. Updates follow `$set` semantics.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Target, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held for `target`
    pub async fn count(&self, target: &Target) -> usize {
        let collections = self.collections.read().await;
        collections.get(target).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_one(&self, target: &Target, document: Value) -> Result<InsertAck> {
        let mut document = into_object(document, "document")?;
        let id = document
            .entry("_id")
            .or_insert_with(|| json!({ "$oid": ObjectId::new().to_hex() }))
            .clone();

        let mut collections = self.collections.write().await;
        let documents = collections.entry(target.clone()).or_default();

        if documents.iter().any(|d| d.get("_id") == Some(&id)) {
            return Err(Error::Store(format!(
                "E11000 duplicate key error collection: {} index: _id_ dup key: {}",
                target, id
            )));
        }

        documents.push(document);
        tracing::trace!("Inserted document into {}", target);

        Ok(InsertAck { inserted_id: id })
    }

    async fn find(&self, target: &Target, filter: Value) -> Result<Vec<Value>> {
        let filter = into_filter(filter)?;

        let collections = self.collections.read().await;
        let documents = match collections.get(target) {
            Some(documents) => documents,
            None => return Ok(Vec::new()),
        };

        Ok(documents
            .iter()
            .filter(|d| matches(d, &filter))
            .map(|d| Value::Object(d.clone()))
            .collect())
    }

    async fn update_many(&self, target: &Target, filter: Value, fields: Value) -> Result<UpdateAck> {
        let filter = into_filter(filter)?;
        let fields = into_object(fields, "data")?;
        for key in fields.keys() {
            if key.is_empty() || key.starts_with('$') || key.split('.').any(str::is_empty) {
                return Err(Error::Store(format!("invalid field name in update: '{}'", key)));
            }
        }

        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(target) else {
            return Ok(UpdateAck {
                matched_count: 0,
                modified_count: 0,
                upserted_count: 0,
                upserted_id: None,
            });
        };

        // Apply to copies first so a failing document leaves the collection untouched
        let mut updated = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if !matches(document, &filter) {
                continue;
            }
            let mut copy = document.clone();
            for (key, value) in &fields {
                set_path(&mut copy, key, value.clone())?;
            }
            if copy.get("_id") != document.get("_id") {
                return Err(Error::Store(
                    "Performing an update on the path '_id' would modify the immutable field '_id'"
                        .to_string(),
                ));
            }
            updated.push((index, copy));
        }

        let matched_count = updated.len() as u64;
        let mut modified_count = 0;
        for (index, copy) in updated {
            if documents[index] != copy {
                documents[index] = copy;
                modified_count += 1;
            }
        }

        Ok(UpdateAck {
            matched_count,
            modified_count,
            upserted_count: 0,
            upserted_id: None,
        })
    }

    async fn delete_many(&self, target: &Target, filter: Value) -> Result<DeleteAck> {
        let filter = into_filter(filter)?;

        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(target) else {
            return Ok(DeleteAck { deleted_count: 0 });
        };

        let before = documents.len();
        documents.retain(|d| !matches(d, &filter));

        Ok(DeleteAck {
            deleted_count: (before - documents.len()) as u64,
        })
    }
}

fn into_object(value: Value, what: &str) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidDocument(format!("{} must be a JSON object", what))),
    }
}

/// Extended JSON type wrappers, compared as literal values rather than operators
const EXTJSON_TYPES: &[&str] = &[
    "$oid",
    "$date",
    "$numberInt",
    "$numberLong",
    "$numberDouble",
    "$numberDecimal",
    "$binary",
    "$uuid",
    "$timestamp",
    "$regularExpression",
    "$symbol",
    "$code",
    "$minKey",
    "$maxKey",
];

fn is_extjson_value(map: &Document) -> bool {
    map.len() == 1 && map.keys().all(|k| EXTJSON_TYPES.contains(&k.as_str()))
}

fn into_filter(filter: Value) -> Result<Document> {
    let filter = into_object(filter, "query")?;
    for (key, value) in &filter {
        if key.starts_with('$') {
            return Err(Error::Store(format!("unsupported query operator: {}", key)));
        }
        if let Value::Object(inner) = value {
            if is_extjson_value(inner) {
                continue;
            }
            if let Some(op) = inner.keys().find(|k| k.starts_with('$')) {
                return Err(Error::Store(format!("unsupported query operator: {}", op)));
            }
        }
    }
    Ok(filter)
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(path, expected)| lookup(document, path) == Some(expected))
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set `value` at a dotted path, creating intermediate objects as needed
fn set_path(document: &mut Document, path: &str, value: Value) -> Result<()> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or(path);

    let mut current = document;
    for segment in segments {
        let next = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        current = match next {
            Value::Object(map) => map,
            other => {
                return Err(Error::Store(format!(
                    "Cannot create field '{}' in element {{{}: {}}}",
                    last, segment, other
                )))
            }
        };
    }

    current.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(coll: &str) -> Target {
        Target::new("testdb", coll).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_object_id() {
        let store = MemoryStore::new();
        let ack = store
            .insert_one(&target("people"), json!({"name": "alice"}))
            .await
            .unwrap();

        let oid = ack.inserted_id["$oid"].as_str().unwrap();
        assert_eq!(oid.len(), 24);

        let docs = store.find(&target("people"), json!({})).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["_id"], ack.inserted_id);
    }

    #[tokio::test]
    async fn test_insert_keeps_caller_id_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let ack = store
            .insert_one(&target("people"), json!({"_id": 7, "name": "alice"}))
            .await
            .unwrap();
        assert_eq!(ack.inserted_id, json!(7));

        let err = store
            .insert_one(&target("people"), json!({"_id": 7, "name": "bob"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
        assert_eq!(store.count(&target("people")).await, 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_non_object() {
        let store = MemoryStore::new();
        let result = store.insert_one(&target("people"), json!("alice")).await;
        assert!(matches!(result, Err(Error::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_find_matches_dotted_paths() {
        let store = MemoryStore::new();
        let people = target("people");
        store
            .insert_one(&people, json!({"name": "alice", "address": {"city": "Paris"}}))
            .await
            .unwrap();
        store
            .insert_one(&people, json!({"name": "bob", "address": {"city": "Oslo"}}))
            .await
            .unwrap();

        let docs = store
            .find(&people, json!({"address.city": "Oslo"}))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "bob");
    }

    #[tokio::test]
    async fn test_find_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let docs = store.find(&target("nothing"), json!({})).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_generated_id_is_usable_as_filter() {
        let store = MemoryStore::new();
        let people = target("people");
        let ack = store
            .insert_one(&people, json!({"name": "alice"}))
            .await
            .unwrap();
        store
            .insert_one(&people, json!({"name": "bob"}))
            .await
            .unwrap();

        let by_id = json!({"_id": ack.inserted_id});
        let docs = store.find(&people, by_id.clone()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "alice");

        let updated = store
            .update_many(&people, by_id.clone(), json!({"age": 31}))
            .await
            .unwrap();
        assert_eq!(updated.matched_count, 1);

        let deleted = store.delete_many(&people, by_id).await.unwrap();
        assert_eq!(deleted.deleted_count, 1);
        assert_eq!(store.count(&people).await, 1);
    }

    #[tokio::test]
    async fn test_extjson_wrapper_with_extra_keys_is_an_operator() {
        let store = MemoryStore::new();
        let result = store
            .find(&target("people"), json!({"_id": {"$oid": "abc", "$ne": 1}}))
            .await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_operators_are_rejected() {
        let store = MemoryStore::new();
        let result = store
            .find(&target("people"), json!({"age": {"$gt": 3}}))
            .await;
        assert!(matches!(result, Err(Error::Store(_))));

        let result = store.delete_many(&target("people"), json!({"$or": []})).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_update_sets_fields_only() {
        let store = MemoryStore::new();
        let people = target("people");
        store
            .insert_one(&people, json!({"name": "alice", "role": "dev", "age": 30}))
            .await
            .unwrap();
        store
            .insert_one(&people, json!({"name": "bob", "role": "dev", "age": 40}))
            .await
            .unwrap();
        store
            .insert_one(&people, json!({"name": "carol", "role": "ops", "age": 50}))
            .await
            .unwrap();

        let ack = store
            .update_many(&people, json!({"role": "dev"}), json!({"age": 40, "team.name": "core"}))
            .await
            .unwrap();
        assert_eq!(ack.matched_count, 2);
        // bob already had age 40 but gains the nested team field
        assert_eq!(ack.modified_count, 2);

        let devs = store.find(&people, json!({"role": "dev"})).await.unwrap();
        for doc in &devs {
            assert_eq!(doc["age"], 40);
            assert_eq!(doc["team"]["name"], "core");
        }
        let ops = store.find(&people, json!({"role": "ops"})).await.unwrap();
        assert_eq!(ops[0]["age"], 50);
        assert!(ops[0].get("team").is_none());
    }

    #[tokio::test]
    async fn test_update_without_change_is_not_modified() {
        let store = MemoryStore::new();
        let people = target("people");
        store
            .insert_one(&people, json!({"name": "alice"}))
            .await
            .unwrap();

        let ack = store
            .update_many(&people, json!({}), json!({"name": "alice"}))
            .await
            .unwrap();
        assert_eq!(ack.matched_count, 1);
        assert_eq!(ack.modified_count, 0);
    }

    #[tokio::test]
    async fn test_update_cannot_change_id() {
        let store = MemoryStore::new();
        let people = target("people");
        store
            .insert_one(&people, json!({"_id": 1, "name": "alice"}))
            .await
            .unwrap();

        let result = store
            .update_many(&people, json!({}), json!({"_id": 2}))
            .await;
        assert!(result.is_err());

        let docs = store.find(&people, json!({"_id": 1})).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_update_through_scalar_fails() {
        let store = MemoryStore::new();
        let people = target("people");
        store
            .insert_one(&people, json!({"name": "alice"}))
            .await
            .unwrap();

        let result = store
            .update_many(&people, json!({}), json!({"name.first": "a"}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = MemoryStore::new();
        let people = target("people");
        for name in ["alice", "bob", "alice"] {
            store
                .insert_one(&people, json!({"name": name}))
                .await
                .unwrap();
        }

        let ack = store
            .delete_many(&people, json!({"name": "alice"}))
            .await
            .unwrap();
        assert_eq!(ack.deleted_count, 2);
        assert_eq!(store.count(&people).await, 1);

        let ack = store.delete_many(&people, json!({})).await.unwrap();
        assert_eq!(ack.deleted_count, 1);
        assert_eq!(store.count(&people).await, 0);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = MemoryStore::new();
        store
            .insert_one(&target("a"), json!({"x": 1}))
            .await
            .unwrap();
        store
            .insert_one(&Target::new("otherdb", "a").unwrap(), json!({"x": 1}))
            .await
            .unwrap();

        assert_eq!(store.count(&target("a")).await, 1);
        assert_eq!(store.count(&target("b")).await, 0);
    }
}
