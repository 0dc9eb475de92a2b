//! Change-audit event model.
//!
//! Every successful mutation hands the recorder an explicit, typed list of
//! changed scalar fields, assembled by the operation itself. The concurrency
//! version token is never part of a change set, and events with an empty
//! change set are not emitted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
  Created,
  Updated,
  Deleted,
}

impl AuditAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      AuditAction::Created => "Created",
      AuditAction::Updated => "Updated",
      AuditAction::Deleted => "Deleted",
    }
  }
}

/// One scalar field change: old value absent for creations, new value absent
/// for deletions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
  pub field: &'static str,
  pub old: Option<JsonValue>,
  pub new: Option<JsonValue>,
}

impl FieldChange {
  pub fn set(field: &'static str, new: impl Serialize) -> Self {
    Self {
      field,
      old: None,
      new: serde_json::to_value(new).ok(),
    }
  }

  pub fn changed(field: &'static str, old: impl Serialize, new: impl Serialize) -> Self {
    Self {
      field,
      old: serde_json::to_value(old).ok(),
      new: serde_json::to_value(new).ok(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
  pub entity_type: &'static str,
  pub entity_id: String,
  pub action: AuditAction,
  pub changes: Vec<FieldChange>,
  pub performed_by: Option<Uuid>,
  pub performed_at: DateTime<Utc>,
}

impl AuditEvent {
  pub fn new(
    entity_type: &'static str,
    entity_id: impl ToString,
    action: AuditAction,
    changes: Vec<FieldChange>,
    performed_by: Uuid,
  ) -> Self {
    Self {
      entity_type,
      entity_id: entity_id.to_string(),
      action,
      changes,
      performed_by: Some(performed_by),
      performed_at: Utc::now(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }
}

/// External observer of mutations. Fire and forget: recording happens after
/// the operation has committed, and its outcome never affects the caller.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
  async fn record(&self, event: AuditEvent);
}
