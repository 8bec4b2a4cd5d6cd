//! fieldsync - offline-first sync for small field-operations datasets.
//!
//! Field crews keep a local SQLite replica of jobs, material lines, location
//! pins, and checklist items that converges with a multi-tenant PostgreSQL
//! server of record. The core is the delta-sync protocol: idempotent batch
//! pushes, monotonic delta pulls, last-write-wins conflict resolution, and
//! transaction-scoped tenant isolation enforced by the storage engine's
//! row-level security policies.

pub mod commands;
pub mod config;
pub mod models;
pub mod protocol;
pub mod server;
pub mod sync;
