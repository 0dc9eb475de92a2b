use async_trait::async_trait;

use crate::domain::audit::{AuditEvent, AuditRecorder};

/// Structured-log audit recorder. Each event becomes one log line; a real
/// deployment can swap in a persisting recorder behind the same port.
pub struct TracingAuditRecorder;

impl TracingAuditRecorder {
  pub fn new() -> Self {
    Self
  }
}

impl Default for TracingAuditRecorder {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl AuditRecorder for TracingAuditRecorder {
  async fn record(&self, event: AuditEvent) {
    let changes = serde_json::to_string(&event.changes).unwrap_or_else(|e| {
      tracing::warn!("Failed to serialize audit change set: {}", e);
      "[]".to_string()
    });

    tracing::info!(
      entity_type = event.entity_type,
      entity_id = %event.entity_id,
      action = event.action.as_str(),
      performed_by = ?event.performed_by,
      performed_at = %event.performed_at,
      changes = %changes,
      "Audit event"
    );
  }
}
