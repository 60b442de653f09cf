//! pilot-bridge - per-device PalmOS HotSync database storage.
//!
//! This library exposes the storage engine behind the `pilot-bridge` CLI so
//! that a sync engine, tests or other front ends can use it directly.
//!
//! # Modules
//!
//! - `pdb`: PDB/PRC container parsing and serialization
//! - `storage`: hierarchical storage backend trait with fs, SQLite and memory adapters
//! - `store`: the per-device store (backup and install partitions, client id, archives)
//! - `sync`: the persistence contract a HotSync engine consumes
//! - `icon`: tAIB application icon decoding and rendering
//! - `config`: configuration file handling
//! - `error`: error types with user-recoverable hints
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod icon;
pub mod logging;
pub mod pdb;
pub mod storage;
pub mod store;
pub mod sync;
