use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::audit::{AuditEvent, AuditRecorder};

/// Buffering audit recorder, used by tests to assert on emitted events.
pub struct MemoryAuditRecorder {
  events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditRecorder {
  pub fn new() -> Self {
    Self {
      events: Mutex::new(Vec::new()),
    }
  }

  pub fn events(&self) -> Vec<AuditEvent> {
    self.lock().clone()
  }

  /// Drains and returns the buffered events.
  pub fn take(&self) -> Vec<AuditEvent> {
    std::mem::take(&mut *self.lock())
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEvent>> {
    self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Default for MemoryAuditRecorder {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl AuditRecorder for MemoryAuditRecorder {
  async fn record(&self, event: AuditEvent) {
    self.lock().push(event);
  }
}
