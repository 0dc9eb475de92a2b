pub mod memory_recorder;
pub mod tracing_recorder;

pub use memory_recorder::MemoryAuditRecorder;
pub use tracing_recorder::TracingAuditRecorder;
