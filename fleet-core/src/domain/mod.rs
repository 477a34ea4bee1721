//! Core domain types
//!
//! Entities owned by the management server (endpoints, jobs) as the client
//! sees them, plus the execution log record the client persists locally.

pub mod endpoint;
pub mod execution_log;
pub mod job;
