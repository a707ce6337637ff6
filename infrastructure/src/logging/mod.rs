//! Audit log adapters

mod jsonl_audit;

pub use jsonl_audit::JsonlAuditLog;
