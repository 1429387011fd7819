//! Core types for docgate

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// One of the four operations the gateway can forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Find,
    UpdateMany,
    DeleteMany,
}

impl Operation {
    /// Resolve an action-dispatch `action` string.
    ///
    /// `upate` is a legacy misspelling some clients still send, so it is
    /// accepted next to `update`.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "insert" => Some(Operation::Insert),
            "get" => Some(Operation::Find),
            "update" | "upate" => Some(Operation::UpdateMany),
            "delete" => Some(Operation::DeleteMany),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Find => "find",
            Operation::UpdateMany => "update",
            Operation::DeleteMany => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (database, collection) pair a request operates on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub db: String,
    pub collection: String,
}

impl Target {
    /// Build a target from raw path segments. The database is checked first.
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Result<Self> {
        let db = db.into();
        let collection = collection.into();

        if db.is_empty() {
            return Err(Error::MissingDb);
        }
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }

        Ok(Self { db, collection })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// A validated request, ready to hand to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Insert { data: Value },
    Find { query: Value },
    UpdateMany { query: Value, data: Value },
    DeleteMany { query: Value },
}

impl OperationRequest {
    pub fn operation(&self) -> Operation {
        match self {
            OperationRequest::Insert { .. } => Operation::Insert,
            OperationRequest::Find { .. } => Operation::Find,
            OperationRequest::UpdateMany { .. } => Operation::UpdateMany,
            OperationRequest::DeleteMany { .. } => Operation::DeleteMany,
        }
    }
}

/// Body of an action-dispatch request
#[derive(Debug, ToSchema)]
pub struct ActionRequest {
    /// One of `insert`, `get`, `update` (or `upate`), `delete`
    #[schema(value_type = String)]
    pub action: Option<Value>,
    /// Filter document, required by `get`, `update` and `delete`
    #[schema(value_type = Option<Object>)]
    pub query: Option<Value>,
    /// Document to insert, or fields to set on update
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

impl ActionRequest {
    /// Interpret a decoded body. Anything that is not a JSON object has no
    /// `action` key and is rejected as such.
    pub fn from_body(body: Value) -> Result<Self> {
        match body {
            // A present but null `action` is an unknown action, not a missing one
            Value::Object(mut map) => Ok(Self {
                action: map.remove("action"),
                query: non_null(map.remove("query")),
                data: non_null(map.remove("data")),
            }),
            _ => Err(Error::MissingAction),
        }
    }

    pub fn into_operation(self) -> Result<OperationRequest> {
        let action = self.action.ok_or(Error::MissingAction)?;
        let operation = action
            .as_str()
            .and_then(Operation::from_action)
            .ok_or(Error::UnknownAction)?;

        match operation {
            Operation::Insert => Ok(OperationRequest::Insert {
                data: self.data.ok_or(Error::MissingData)?,
            }),
            Operation::Find => Ok(OperationRequest::Find {
                query: self.query.ok_or(Error::MissingQuery)?,
            }),
            Operation::UpdateMany => {
                let query = self.query.ok_or(Error::MissingQuery)?;
                let data = self.data.ok_or(Error::MissingData)?;
                Ok(OperationRequest::UpdateMany { query, data })
            }
            Operation::DeleteMany => Ok(OperationRequest::DeleteMany {
                query: self.query.ok_or(Error::MissingQuery)?,
            }),
        }
    }
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

/// Build a filter from URL query parameters: string values, first occurrence wins.
pub fn filter_from_params(params: Vec<(String, String)>) -> Value {
    let mut filter = Map::new();
    for (key, value) in params {
        filter.entry(key).or_insert(Value::String(value));
    }
    Value::Object(filter)
}

// Acknowledgments. Field names follow the wire format existing clients parse.

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InsertAck {
    /// Identifier of the inserted document
    #[serde(rename = "InsertedID")]
    #[schema(value_type = Object)]
    pub inserted_id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UpdateAck {
    /// Documents matched by the filter
    #[serde(rename = "MatchedCount")]
    pub matched_count: u64,
    /// Documents actually changed
    #[serde(rename = "ModifiedCount")]
    pub modified_count: u64,
    #[serde(rename = "UpsertedCount")]
    pub upserted_count: u64,
    #[serde(rename = "UpsertedID")]
    #[schema(value_type = Option<Object>)]
    pub upserted_id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeleteAck {
    /// Documents removed
    #[serde(rename = "DeletedCount")]
    pub deleted_count: u64,
}

/// Whatever a dispatched operation produced, encoded verbatim in the 200 body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationResult {
    Inserted(InsertAck),
    Documents(Vec<Value>),
    Updated(UpdateAck),
    Deleted(DeleteAck),
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Gateway version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> Result<OperationRequest> {
        ActionRequest::from_body(body)?.into_operation()
    }

    #[test]
    fn test_target_requires_db_first() {
        assert!(matches!(Target::new("", ""), Err(Error::MissingDb)));
        assert!(matches!(Target::new("", "coll"), Err(Error::MissingDb)));
        assert!(matches!(Target::new("db", ""), Err(Error::MissingCollection)));

        let target = Target::new("db", "coll").unwrap();
        assert_eq!(target.to_string(), "db.coll");
    }

    #[test]
    fn test_missing_action() {
        assert!(matches!(parse(json!({})), Err(Error::MissingAction)));
        assert!(matches!(parse(json!([1, 2])), Err(Error::MissingAction)));
    }

    #[test]
    fn test_unknown_action() {
        assert!(matches!(parse(json!({"action": "bogus"})), Err(Error::UnknownAction)));
        assert!(matches!(parse(json!({"action": 7})), Err(Error::UnknownAction)));
        // The key is present, so this is not a missing action
        assert!(matches!(parse(json!({"action": null})), Err(Error::UnknownAction)));
    }

    #[test]
    fn test_insert_requires_data() {
        assert!(matches!(
            parse(json!({"action": "insert", "query": {}})),
            Err(Error::MissingData)
        ));

        let req = parse(json!({"action": "insert", "data": {"a": 1}})).unwrap();
        assert_eq!(req, OperationRequest::Insert { data: json!({"a": 1}) });
    }

    #[test]
    fn test_get_requires_query() {
        assert!(matches!(parse(json!({"action": "get"})), Err(Error::MissingQuery)));
        assert!(matches!(
            parse(json!({"action": "get", "query": null})),
            Err(Error::MissingQuery)
        ));
    }

    #[test]
    fn test_update_checks_query_before_data() {
        assert!(matches!(parse(json!({"action": "update"})), Err(Error::MissingQuery)));
        assert!(matches!(
            parse(json!({"action": "update", "query": {}})),
            Err(Error::MissingData)
        ));
    }

    #[test]
    fn test_update_accepts_legacy_spelling() {
        let body = json!({"action": "upate", "query": {"a": 1}, "data": {"b": 2}});
        let req = parse(body).unwrap();
        assert_eq!(req.operation(), Operation::UpdateMany);

        let body = json!({"action": "update", "query": {"a": 1}, "data": {"b": 2}});
        assert_eq!(parse(body).unwrap().operation(), Operation::UpdateMany);
    }

    #[test]
    fn test_delete_requires_query() {
        assert!(matches!(parse(json!({"action": "delete"})), Err(Error::MissingQuery)));
        let req = parse(json!({"action": "delete", "query": {}})).unwrap();
        assert_eq!(req, OperationRequest::DeleteMany { query: json!({}) });
    }

    #[test]
    fn test_filter_from_params_keeps_first_value() {
        let params = vec![
            ("name".to_string(), "alice".to_string()),
            ("age".to_string(), "30".to_string()),
            ("name".to_string(), "bob".to_string()),
        ];
        assert_eq!(
            filter_from_params(params),
            json!({"name": "alice", "age": "30"})
        );
        assert_eq!(filter_from_params(Vec::new()), json!({}));
    }

    #[test]
    fn test_ack_wire_names() {
        let ack = OperationResult::Updated(UpdateAck {
            matched_count: 2,
            modified_count: 1,
            upserted_count: 0,
            upserted_id: None,
        });
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            json!({"MatchedCount": 2, "ModifiedCount": 1, "UpsertedCount": 0, "UpsertedID": null})
        );

        let ack = OperationResult::Deleted(DeleteAck { deleted_count: 3 });
        assert_eq!(serde_json::to_value(&ack).unwrap(), json!({"DeletedCount": 3}));
    }
}
