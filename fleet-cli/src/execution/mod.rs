//! Remote execution
//!
//! Building a submission, streaming its job results, and keeping the
//! execution log used to retry failed endpoints.

pub mod controller;
pub mod log;
pub mod orchestrator;
pub mod render;
pub mod request;

pub use orchestrator::{ExecutionSummary, Executor, Invocation, Targeting};
pub use render::{JobRenderer, JsonRenderer, TextRenderer};
