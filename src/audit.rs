//! Change records for the external audit collaborator.
//!
//! Every engine mutation produces one [`ChangeRecord`] describing the fields
//! it touched. The engine only produces the trail; storing, filtering, and
//! rendering it as edit history is a collaborator concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Old and new value of one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// One mutation applied to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub entity_id: Uuid,
    /// Entity kind, e.g. "order", "live_batch", "dressed_batch".
    pub entity_kind: String,
    pub changed_fields: HashMap<String, FieldChange>,
    pub timestamp: DateTime<Utc>,
}

/// Builder that records only fields whose value actually changed.
#[derive(Debug)]
pub struct ChangeSet {
    entity_id: Uuid,
    entity_kind: String,
    changed_fields: HashMap<String, FieldChange>,
}

impl ChangeSet {
    pub fn new(entity_id: Uuid, entity_kind: impl Into<String>) -> Self {
        Self {
            entity_id,
            entity_kind: entity_kind.into(),
            changed_fields: HashMap::new(),
        }
    }

    /// Records `field` if `old` and `new` differ once serialized.
    pub fn record<T: Serialize>(mut self, field: &str, old: &T, new: &T) -> Self {
        let old = serde_json::to_value(old).unwrap_or(Value::Null);
        let new = serde_json::to_value(new).unwrap_or(Value::Null);
        if old != new {
            self.changed_fields
                .insert(field.to_string(), FieldChange { old, new });
        }
        self
    }

    /// Records the creation of an entity as a single "created" pseudo-field.
    pub fn created<T: Serialize>(self, entity: &T) -> Self {
        let value = serde_json::to_value(entity).unwrap_or(Value::Null);
        self.record("created", &Value::Null, &value)
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields.is_empty()
    }

    /// Finalizes the record, stamping the current time.
    pub fn finish(self) -> ChangeRecord {
        ChangeRecord {
            entity_id: self.entity_id,
            entity_kind: self.entity_kind,
            changed_fields: self.changed_fields,
            timestamp: Utc::now(),
        }
    }
}
