//! Edges of the service: command input and event/snapshot output formats.

pub mod csv;
pub mod jsonl;
