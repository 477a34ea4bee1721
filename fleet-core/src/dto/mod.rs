//! Data Transfer Objects for talking to the management server
//!
//! Request payloads and the response envelopes wrapped around them.

pub mod error;
pub mod execution;
pub mod response;
