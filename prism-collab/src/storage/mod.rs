//! Persistent storage for the project list.
//!
//! ```text
//! ┌─────────────┐   save(&[Project])   ┌──────────────────────────────┐
//! │ ProjectList │ ───────────────────► │ ProjectStore (RocksDB)       │
//! │ (in-memory) │ ◄─────────────────── │ key "prism_projects"         │
//! └─────────────┘   load() at startup  │ value: LZ4(JSON [Project])   │
//!                                      └──────────────────────────────┘
//! ```
//!
//! The whole list is one opaque blob rewritten on every change. A missing
//! or unreadable blob loads as an empty list.

pub mod projects;

pub use projects::{ProjectStore, StoreConfig, StoreError, STORAGE_KEY};
