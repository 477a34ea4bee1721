//! Fleet Core
//!
//! Core types shared by the Fleet client library and CLI.
//!
//! This crate contains:
//! - Domain types: endpoints, job results and execution log records
//! - DTOs: payloads exchanged with the management server

pub mod domain;
pub mod dto;
